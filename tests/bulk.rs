#![allow(dead_code)]

use rivet::{
    distributed_slice, implements, Constructor, Container, Export, ExportFn, Injectable, OverridePolicy, PropertySlot,
    RegisterErrorKind, Registration, ServiceId, EXPORTS,
};
use std::sync::Arc;
use tracing_test::traced_test;

trait Invoices: Send + Sync {
    fn backend(&self) -> &'static str;
}

struct SqlInvoices;

impl Invoices for SqlInvoices {
    fn backend(&self) -> &'static str {
        "sql"
    }
}

impl Injectable for SqlInvoices {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|| SqlInvoices)]
    }
}

implements!(SqlInvoices: dyn Invoices);

struct InMemoryInvoices;

impl Invoices for InMemoryInvoices {
    fn backend(&self) -> &'static str {
        "memory"
    }
}

struct Billing(Arc<dyn Invoices>);

impl Injectable for Billing {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(Billing)]
    }
}

struct Ledger {
    invoices: Option<Arc<dyn Invoices>>,
}

impl Injectable for Ledger {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|| Ledger { invoices: None })]
    }

    fn properties() -> Vec<PropertySlot<Self>> {
        vec![PropertySlot::new("invoices", |this: &mut Self, invoices: Arc<dyn Invoices>| {
            this.invoices = Some(invoices);
        })]
    }
}

struct Plain;

impl Injectable for Plain {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|| Plain)]
    }
}

#[distributed_slice]
#[linkme(crate = rivet::linkme)]
static BILLING_UNIT: [ExportFn];

#[distributed_slice(BILLING_UNIT)]
#[linkme(crate = rivet::linkme)]
static INVOICES_EXPORT: ExportFn = || Export::service_as::<dyn Invoices, SqlInvoices>().singleton();

#[distributed_slice(BILLING_UNIT)]
#[linkme(crate = rivet::linkme)]
static BILLING_EXPORT: ExportFn = || Export::constructor::<Billing>();

#[distributed_slice(BILLING_UNIT)]
#[linkme(crate = rivet::linkme)]
static LEDGER_EXPORT: ExportFn = || Export::properties::<Ledger>();

#[distributed_slice(BILLING_UNIT)]
#[linkme(crate = rivet::linkme)]
static PLAIN_EXPORT: ExportFn = || Export::properties::<Plain>();

#[distributed_slice]
#[linkme(crate = rivet::linkme)]
static DUPLICATED_UNIT: [ExportFn];

#[distributed_slice(DUPLICATED_UNIT)]
#[linkme(crate = rivet::linkme)]
static PLAIN_SERVICE_EXPORT: ExportFn = || Export::service::<Plain>();

#[distributed_slice(DUPLICATED_UNIT)]
#[linkme(crate = rivet::linkme)]
static PLAIN_CONSTRUCTOR_EXPORT: ExportFn = || Export::constructor::<Plain>().singleton();

struct Clock;

impl Injectable for Clock {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|| Clock)]
    }
}

#[distributed_slice(EXPORTS)]
#[linkme(crate = rivet::linkme)]
static CLOCK_EXPORT: ExportFn = || Export::service::<Clock>().singleton();

#[test]
#[traced_test]
fn test_load_bulk() {
    let container = Container::new();

    assert_eq!(container.load_bulk(&BILLING_UNIT, OverridePolicy::Reject).unwrap(), 3);

    let billing = container.resolve::<Billing>().unwrap();
    let ledger = container.resolve::<Ledger>().unwrap();

    assert_eq!(billing.0.backend(), "sql");
    assert!(std::ptr::addr_eq(
        Arc::as_ptr(&billing.0),
        Arc::as_ptr(ledger.invoices.as_ref().unwrap())
    ));
    assert!(!container.is_registered::<Plain>());
}

#[test]
#[traced_test]
fn test_load_bulk_reject_is_atomic() {
    let container = Container::new();
    container
        .register_instance::<dyn Invoices>(Arc::new(InMemoryInvoices))
        .unwrap();

    assert!(matches!(
        container.load_bulk(&BILLING_UNIT, OverridePolicy::Reject),
        Err(RegisterErrorKind::DuplicateRegistration(service)) if service == ServiceId::of::<dyn Invoices>()
    ));
    assert!(!container.is_registered::<Billing>());
    assert!(!container.is_registered::<Ledger>());
}

#[test]
#[traced_test]
fn test_load_bulk_override_policies() {
    let kept = Container::new();
    kept.register_instance::<dyn Invoices>(Arc::new(InMemoryInvoices))
        .unwrap();
    assert_eq!(kept.load_bulk(&BILLING_UNIT, OverridePolicy::KeepExisting).unwrap(), 2);
    assert_eq!(kept.resolve::<Billing>().unwrap().0.backend(), "memory");

    let replaced = Container::new();
    replaced
        .register_with(Registration::instance::<dyn Invoices>(Arc::new(InMemoryInvoices)), OverridePolicy::Reject)
        .unwrap();
    assert_eq!(replaced.load_bulk(&BILLING_UNIT, OverridePolicy::Replace).unwrap(), 3);
    assert_eq!(replaced.resolve::<Billing>().unwrap().0.backend(), "sql");
}

#[test]
#[traced_test]
fn test_load_bulk_duplicate_in_unit() {
    let container = Container::new();

    assert!(matches!(
        container.load_bulk(&DUPLICATED_UNIT, OverridePolicy::Replace),
        Err(RegisterErrorKind::DuplicateRegistration(service)) if service == ServiceId::of::<Plain>()
    ));
    assert!(!container.is_registered::<Plain>());
}

#[test]
#[traced_test]
fn test_load_exports() {
    let container = Container::new();

    assert_eq!(container.load_exports(OverridePolicy::Reject).unwrap(), 1);
    assert!(Arc::ptr_eq(
        &container.resolve::<Clock>().unwrap(),
        &container.resolve::<Clock>().unwrap()
    ));

    let child = container.child().unwrap();
    assert_eq!(child.load_bulk(&BILLING_UNIT, OverridePolicy::Reject).unwrap(), 3);
    assert!(child.resolve::<Clock>().is_ok());
}
