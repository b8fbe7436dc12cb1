//! Shared referent and helpers for the integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicI64, Ordering};

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use standin_core::{Authority, AuthorityConfig, MethodDescriptor, MethodTable, Referent};
use standin_sdk::{
    arg, Description, ErasedType, FromValue, InvokeResult, MethodCode, ReferentClass, Signature,
    StandinError, StandinResult, Value,
};

/// Install a test subscriber once; later calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt::try_init();
}

static AUTHORITY: Lazy<&'static Authority> = Lazy::new(|| {
    Authority::install(AuthorityConfig::default()).expect("test binary installs the authority once")
});

/// The process authority, installed with default grants on first use
pub fn authority() -> &'static Authority {
    *AUTHORITY
}

/// Raised by `withdraw` when the balance is too low
#[derive(Debug, thiserror::Error)]
#[error("insufficient funds: balance {balance}, requested {requested}")]
pub struct Overdraft {
    pub balance: i64,
    pub requested: i64,
}

#[derive(Default)]
pub struct Account {
    owner: Mutex<String>,
    balance: AtomicI64,
}

impl Account {
    pub fn new(owner: &str, balance: i64) -> Self {
        Self {
            owner: Mutex::new(owner.to_string()),
            balance: AtomicI64::new(balance),
        }
    }

    pub fn balance(&self) -> i64 {
        self.balance.load(Ordering::SeqCst)
    }
}

static ACCOUNT: Lazy<ReferentClass> = Lazy::new(|| ReferentClass::new::<Account>("Account"));

fn get_balance(a: &Account, _: &[Value]) -> InvokeResult {
    Ok(Value::I64(a.balance()))
}

fn deposit(a: &Account, args: &[Value]) -> InvokeResult {
    let amount: i64 = arg(args, 0)?;
    Ok(Value::I64(a.balance.fetch_add(amount, Ordering::SeqCst) + amount))
}

fn withdraw(a: &Account, args: &[Value]) -> InvokeResult {
    let requested: i64 = arg(args, 0)?;
    let balance = a.balance();
    if requested > balance {
        return Err(StandinError::raised(Overdraft { balance, requested }));
    }
    Ok(Value::I64(a.balance.fetch_sub(requested, Ordering::SeqCst) - requested))
}

fn owner(a: &Account, _: &[Value]) -> InvokeResult {
    Ok(Value::Str(a.owner.lock().clone()))
}

fn rename(a: &Account, args: &[Value]) -> InvokeResult {
    *a.owner.lock() = arg(args, 0)?;
    Ok(Value::Null)
}

static ACCOUNT_TABLE: Lazy<MethodTable<Account>> = Lazy::new(|| {
    MethodTable::builder(&ACCOUNT)
        .method(MethodDescriptor::new(
            "getBalance",
            Signature::nullary(ErasedType::I64),
            get_balance,
        ))
        .method(MethodDescriptor::new(
            "deposit",
            Signature::new([ErasedType::I64], ErasedType::I64),
            deposit,
        ))
        .method(MethodDescriptor::new(
            "withdraw",
            Signature::new([ErasedType::I64], ErasedType::I64),
            withdraw,
        ))
        .method(MethodDescriptor::new("owner", Signature::nullary(ErasedType::Str), owner))
        .method(MethodDescriptor::new(
            "rename",
            Signature::new([ErasedType::Str], ErasedType::Void),
            rename,
        ))
        .build()
        .expect("account table")
});

impl Referent for Account {
    fn referent_class() -> &'static ReferentClass {
        &ACCOUNT
    }

    fn method_table() -> &'static MethodTable<Self> {
        &ACCOUNT_TABLE
    }

    fn describe(&self, out: &mut Description) {
        out.push("owner", self.owner.lock().clone());
        out.push("balance", self.balance());
    }

    fn replay(&mut self, description: &Description) -> StandinResult<()> {
        *self.owner.get_mut() = String::from_value(description.require("owner")?)?;
        *self.balance.get_mut() = i64::from_value(description.require("balance")?)?;
        Ok(())
    }
}

pub fn code(name: &str) -> MethodCode {
    ACCOUNT_TABLE
        .code_named(name)
        .unwrap_or_else(|| panic!("Account has no method {}", name))
}
