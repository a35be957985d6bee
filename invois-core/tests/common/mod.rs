use chrono::TimeZone;
use invois_core::credentials::SigningCredentials;
use invois_core::invoice::{
    Address, Billing, Buyer, Contact, DocumentType, FinalizedInvoice, IdScheme, InvoiceBuilder,
    LineItem, LineItemFields, PartyId, Supplier, TaxType,
};
use invois_core::signing::properties::SigningTime;
use iso_currency::Currency;
use isocountry::CountryCode;
use std::path::{Path, PathBuf};

#[allow(dead_code)]
pub const CERTIFICATE_DIGEST: &str = "lFE1n3qpzKtivwTm+lxHCe1DF/afFktNM1nFfx+bEpM=";
#[allow(dead_code)]
pub const SERIAL_NUMBER: &str = "482730796026673791378";

#[allow(dead_code)]
pub fn fixture_path(relative: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(relative)
}

pub fn fixture(relative: &str) -> String {
    std::fs::read_to_string(fixture_path(relative))
        .unwrap_or_else(|err| panic!("read fixture {relative}: {err}"))
}

#[allow(dead_code)]
pub fn credentials() -> SigningCredentials {
    SigningCredentials::from_pem(
        &fixture("credentials/signer-cert.pem"),
        &fixture("credentials/signer-key.pem"),
    )
    .expect("signer credentials")
}

#[allow(dead_code)]
pub fn signing_time() -> SigningTime {
    SigningTime::parse("2025-02-06T01:50:00Z").expect("signing time")
}

#[allow(dead_code)]
pub fn dummy_finalized_invoice() -> FinalizedInvoice {
    let supplier = Supplier::new(
        "Acme Sdn Bhd",
        address(&["Lot 66", "Bangunan Merdeka"]),
        "C2584563200",
        PartyId::new(IdScheme::Brn, "202001234567"),
    )
    .expect("valid supplier")
    .with_industry_classification("46510", "Wholesale of computer hardware")
    .with_contact(Contact {
        telephone: Some("+60-123456789".into()),
        email: Some("supplier@email.com".into()),
    });
    let buyer = Buyer::new(
        "Buyer Trading",
        address(&[]),
        "C2584563201",
        PartyId::new(IdScheme::Brn, "202001234568"),
    )
    .expect("valid buyer");

    InvoiceBuilder::new(
        DocumentType::Invoice(Billing::Standard),
        "INV-12345",
        chrono::Utc.with_ymd_and_hms(2025, 2, 6, 1, 48, 28).unwrap(),
        Currency::MYR,
        supplier,
        buyer,
        vec![LineItem::new(LineItemFields {
            description: "Laptop Peripherals".into(),
            classification: "003".into(),
            quantity: 1.0,
            unit_code: "C62".into(),
            unit_price: 876.3,
            tax_rate: 10.0,
            tax_type: TaxType::SalesTax,
        })],
    )
    .build()
    .expect("build dummy invoice")
}

fn address(lines: &[&str]) -> Address {
    Address {
        country_code: CountryCode::MYS,
        state_code: "14".into(),
        city: "Kuala Lumpur".into(),
        postal_code: "50480".into(),
        lines: lines.iter().map(|line| line.to_string()).collect(),
    }
}
