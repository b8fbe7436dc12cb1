//! Invocable targets backed by local objects
//!
//! Forwarding storage needs something that executes a code. These adapters
//! cover the in-process cases: a bare referent, and another standin reached
//! through its privileged `invoke` so the call lands on that standin's local
//! data even while it is itself forwarding.

use std::sync::Arc;

use standin_sdk::{InvocableTarget, InvokeResult, MethodCode, ReferentClass, Value};

use crate::auth::Authorisation;
use crate::referent::Referent;
use crate::standin::Standin;

/// Target that dispatches straight onto a referent
pub struct LocalTarget<R: Referent> {
    referent: Arc<R>,
}

impl<R: Referent> LocalTarget<R> {
    /// Own `referent`
    pub fn new(referent: R) -> Self {
        Self::shared(Arc::new(referent))
    }

    /// Share an existing referent
    pub fn shared(referent: Arc<R>) -> Self {
        Self { referent }
    }

    /// The referent calls land on
    pub fn referent(&self) -> &Arc<R> {
        &self.referent
    }
}

impl<R: Referent> InvocableTarget for LocalTarget<R> {
    fn declared_class(&self) -> &'static ReferentClass {
        R::referent_class()
    }

    fn invoke(&self, code: MethodCode, args: &[Value]) -> InvokeResult {
        R::method_table().dispatch(&self.referent, code, args)
    }
}

/// Target that enters another standin through its privileged path
pub struct StandinTarget<S: Standin + ?Sized> {
    standin: Arc<S>,
    auth: Arc<Authorisation>,
}

impl<S: Standin + ?Sized> StandinTarget<S> {
    /// Forward into `standin`, authorised by `auth`
    pub fn new(standin: Arc<S>, auth: Arc<Authorisation>) -> Self {
        Self { standin, auth }
    }

    /// The standin calls land on
    pub fn standin(&self) -> &Arc<S> {
        &self.standin
    }
}

impl<S: Standin + ?Sized> InvocableTarget for StandinTarget<S> {
    fn declared_class(&self) -> &'static ReferentClass {
        self.standin.referent_class()
    }

    fn invoke(&self, code: MethodCode, args: &[Value]) -> InvokeResult {
        self.standin.invoke(code, args, &self.auth)
    }
}
