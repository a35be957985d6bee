//! Invoice domain types and builders.
mod builder;
mod document;

pub use builder::{FinalizedInvoice, InvoiceBuilder};
pub use document::DocumentBuilder;

use chrono::{DateTime, Utc};
use iso_currency::Currency;
use isocountry::CountryCode;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use thiserror::Error;

type Result<T> = std::result::Result<T, InvoiceError>;

/// Invoice-related errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvoiceError {
    #[error("invoice has no line items")]
    MissingLineItems,
    #[error("missing tax identification number for {party}")]
    MissingTin { party: &'static str },
    #[error("amount for {field} is not a finite number: {value}")]
    InvalidAmount { field: &'static str, value: f64 },
}

/// Postal address for parties.
///
/// Up to three address lines are emitted; missing lines are written as empty elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(with = "country_alpha3")]
    pub country_code: CountryCode,
    pub state_code: String,
    pub city: String,
    pub postal_code: String,
    pub lines: Vec<String>,
}

impl Address {
    pub fn country_code(&self) -> &CountryCode {
        &self.country_code
    }

    pub fn state_code(&self) -> &str {
        &self.state_code
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn postal_code(&self) -> &str {
        &self.postal_code
    }

    pub fn line(&self, index: usize) -> &str {
        self.lines.get(index).map_or("", String::as_str)
    }
}

mod country_alpha3 {
    use isocountry::CountryCode;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(code: &CountryCode, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(code.alpha3())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<CountryCode, D::Error> {
        let code = String::deserialize(deserializer)?;
        CountryCode::for_alpha3(&code).map_err(|_| {
            serde::de::Error::custom(format!("unknown ISO 3166-1 alpha-3 country code `{code}`"))
        })
    }
}

/// Identification scheme for party identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IdScheme {
    Brn,
    Nric,
    Passport,
    Army,
}

impl IdScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdScheme::Brn => "BRN",
            IdScheme::Nric => "NRIC",
            IdScheme::Passport => "PASSPORT",
            IdScheme::Army => "ARMY",
        }
    }
}

/// Registration identifier with its scheme.
///
/// # Examples
/// ```rust
/// use invois_core::invoice::{IdScheme, PartyId};
///
/// let id = PartyId::new(IdScheme::Brn, "202001234567");
/// assert_eq!(id.as_str(), "202001234567");
/// assert_eq!(id.scheme(), IdScheme::Brn);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyId {
    scheme: IdScheme,
    value: String,
}

impl PartyId {
    pub fn new(scheme: IdScheme, value: impl Into<String>) -> Self {
        Self {
            scheme,
            value: value.into(),
        }
    }

    pub fn scheme(&self) -> IdScheme {
        self.scheme
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub telephone: Option<String>,
    pub email: Option<String>,
}

/// Industry classification (MSIC) code and description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndustryClassification {
    pub code: String,
    pub description: String,
}

/// Marker trait for party role types.
pub trait PartyRole {}

/// Supplier role marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierRole;
impl PartyRole for SupplierRole {}
/// Buyer role marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyerRole;
impl PartyRole for BuyerRole {}

/// Party wrapper with role-specific typing.
///
/// # Examples
/// ```rust
/// use invois_core::invoice::{Address, IdScheme, Party, PartyId, SupplierRole};
/// use isocountry::CountryCode;
///
/// let supplier = Party::<SupplierRole>::new(
///     "Acme Sdn Bhd",
///     Address {
///         country_code: CountryCode::MYS,
///         state_code: "14".into(),
///         city: "Kuala Lumpur".into(),
///         postal_code: "50480".into(),
///         lines: vec!["Lot 66".into(), "Jalan Perdana".into()],
///     },
///     "C2584563200",
///     PartyId::new(IdScheme::Brn, "202001234567"),
/// )?;
/// assert_eq!(supplier.tin(), "C2584563200");
/// # Ok::<(), invois_core::invoice::InvoiceError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party<R: PartyRole> {
    #[serde(skip)]
    _marker: PhantomData<R>,
    name: String,
    address: Address,
    tin: String,
    registration: PartyId,
    #[serde(default)]
    sst_registration: Option<String>,
    #[serde(default)]
    contact: Contact,
    #[serde(default)]
    industry_classification: Option<IndustryClassification>,
}

pub type Supplier = Party<SupplierRole>;
pub type Buyer = Party<BuyerRole>;

impl<R: PartyRole> Party<R> {
    /// # Errors
    /// Returns [`InvoiceError::MissingTin`] if the tax identification number is blank.
    pub fn new(
        name: impl Into<String>,
        address: Address,
        tin: impl Into<String>,
        registration: PartyId,
    ) -> Result<Self> {
        let tin = tin.into().trim().to_string();
        if tin.is_empty() {
            return Err(InvoiceError::MissingTin {
                party: std::any::type_name::<R>().rsplit("::").next().unwrap_or("party"),
            });
        }
        Ok(Self {
            _marker: PhantomData,
            name: name.into(),
            address,
            tin,
            registration,
            sst_registration: None,
            contact: Contact::default(),
            industry_classification: None,
        })
    }

    pub fn with_contact(mut self, contact: Contact) -> Self {
        self.contact = contact;
        self
    }

    pub fn with_sst_registration(mut self, sst: impl Into<String>) -> Self {
        self.sst_registration = Some(sst.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn tin(&self) -> &str {
        &self.tin
    }

    pub fn registration(&self) -> &PartyId {
        &self.registration
    }

    pub fn sst_registration(&self) -> Option<&str> {
        self.sst_registration.as_deref()
    }

    pub fn contact(&self) -> &Contact {
        &self.contact
    }

    pub fn industry_classification(&self) -> Option<&IndustryClassification> {
        self.industry_classification.as_ref()
    }
}

impl Party<SupplierRole> {
    pub fn with_industry_classification(
        mut self,
        code: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.industry_classification = Some(IndustryClassification {
            code: code.into(),
            description: description.into(),
        });
        self
    }
}

/// Who issues the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Billing {
    Standard,
    SelfBilled,
}

/// Reference to the original document for notes.
///
/// # Examples
/// ```rust
/// use invois_core::invoice::OriginalDocumentRef;
///
/// let original = OriginalDocumentRef::new("INV-ORIG").with_uuid("F9D425P6DS7D8IU");
/// assert_eq!(original.id(), "INV-ORIG");
/// assert_eq!(original.uuid(), Some("F9D425P6DS7D8IU"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginalDocumentRef {
    id: String,
    uuid: Option<String>,
}

impl OriginalDocumentRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            uuid: None,
        }
    }

    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = Some(uuid.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn uuid(&self) -> Option<&str> {
        self.uuid.as_deref()
    }
}

/// Document type and the original reference notes must carry.
///
/// # Examples
/// ```rust
/// use invois_core::invoice::{Billing, DocumentType, OriginalDocumentRef};
///
/// assert_eq!(DocumentType::Invoice(Billing::Standard).code(), "01");
/// let note = DocumentType::CreditNote(Billing::SelfBilled, OriginalDocumentRef::new("INV-1"));
/// assert_eq!(note.code(), "12");
/// assert!(note.original().is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentType {
    Invoice(Billing),
    CreditNote(Billing, OriginalDocumentRef),
    DebitNote(Billing, OriginalDocumentRef),
    RefundNote(Billing, OriginalDocumentRef),
}

impl DocumentType {
    pub fn code(&self) -> &'static str {
        match self {
            DocumentType::Invoice(Billing::Standard) => "01",
            DocumentType::CreditNote(Billing::Standard, _) => "02",
            DocumentType::DebitNote(Billing::Standard, _) => "03",
            DocumentType::RefundNote(Billing::Standard, _) => "04",
            DocumentType::Invoice(Billing::SelfBilled) => "11",
            DocumentType::CreditNote(Billing::SelfBilled, _) => "12",
            DocumentType::DebitNote(Billing::SelfBilled, _) => "13",
            DocumentType::RefundNote(Billing::SelfBilled, _) => "14",
        }
    }

    pub fn billing(&self) -> Billing {
        match self {
            DocumentType::Invoice(billing)
            | DocumentType::CreditNote(billing, _)
            | DocumentType::DebitNote(billing, _)
            | DocumentType::RefundNote(billing, _) => *billing,
        }
    }

    pub fn original(&self) -> Option<&OriginalDocumentRef> {
        match self {
            DocumentType::Invoice(_) => None,
            DocumentType::CreditNote(_, original)
            | DocumentType::DebitNote(_, original)
            | DocumentType::RefundNote(_, original) => Some(original),
        }
    }
}

/// Tax type for line items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaxType {
    SalesTax,
    ServiceTax,
    TourismTax,
    HighValueGoodsTax,
    LowValueGoodsTax,
    NotApplicable,
    Exempt,
}

impl TaxType {
    pub fn code(&self) -> &'static str {
        match self {
            TaxType::SalesTax => "01",
            TaxType::ServiceTax => "02",
            TaxType::TourismTax => "03",
            TaxType::HighValueGoodsTax => "04",
            TaxType::LowValueGoodsTax => "05",
            TaxType::NotApplicable => "06",
            TaxType::Exempt => "E",
        }
    }
}

/// Single invoice line item.
///
/// # Examples
/// ```rust
/// use invois_core::invoice::{LineItem, LineItemFields, TaxType};
///
/// let item = LineItem::new(LineItemFields {
///     description: "Laptop".into(),
///     classification: "003".into(),
///     quantity: 2.0,
///     unit_code: "C62".into(),
///     unit_price: 50.0,
///     tax_rate: 10.0,
///     tax_type: TaxType::SalesTax,
/// });
/// assert_eq!(item.total_amount(), 100.0);
/// assert_eq!(item.tax_amount(), 10.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "LineItemFields")]
pub struct LineItem {
    description: String,
    classification: String,
    quantity: f64,
    unit_code: String,
    unit_price: f64,
    total_amount: f64,
    tax_rate: f64,
    tax_amount: f64,
    tax_type: TaxType,
}

/// Fields for creating a line item with computed totals.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LineItemFields {
    pub description: String,
    pub classification: String,
    pub quantity: f64,
    pub unit_code: String,
    pub unit_price: f64,
    pub tax_rate: f64,
    pub tax_type: TaxType,
}

impl LineItem {
    pub fn new(fields: LineItemFields) -> Self {
        let total_amount = fields.quantity * fields.unit_price;
        let tax_amount = total_amount * (fields.tax_rate / 100.0);
        Self {
            description: fields.description,
            classification: fields.classification,
            quantity: fields.quantity,
            unit_code: fields.unit_code,
            unit_price: fields.unit_price,
            total_amount,
            tax_rate: fields.tax_rate,
            tax_amount,
            tax_type: fields.tax_type,
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn classification(&self) -> &str {
        &self.classification
    }

    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    pub fn unit_code(&self) -> &str {
        &self.unit_code
    }

    pub fn unit_price(&self) -> f64 {
        self.unit_price
    }

    pub fn total_amount(&self) -> f64 {
        self.total_amount
    }

    pub fn tax_rate(&self) -> f64 {
        self.tax_rate
    }

    pub fn tax_amount(&self) -> f64 {
        self.tax_amount
    }

    pub fn tax_type(&self) -> TaxType {
        self.tax_type
    }
}

impl From<LineItemFields> for LineItem {
    fn from(fields: LineItemFields) -> Self {
        Self::new(fields)
    }
}

pub type LineItems = Vec<LineItem>;

/// Core invoice data model.
///
/// Instances are produced by [`InvoiceBuilder`] or deserialized from a record file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceData {
    document_type: DocumentType,
    id: String,
    issue_datetime: DateTime<Utc>,
    currency: Currency,
    supplier: Supplier,
    buyer: Buyer,
    line_items: LineItems,
    #[serde(default)]
    invoice_level_charge: f64,
    #[serde(default)]
    invoice_level_discount: f64,
    #[serde(default)]
    allowance_reason: Option<String>,
}

impl InvoiceData {
    pub fn document_type(&self) -> &DocumentType {
        &self.document_type
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn issue_datetime(&self) -> &DateTime<Utc> {
        &self.issue_datetime
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn supplier(&self) -> &Supplier {
        &self.supplier
    }

    pub fn buyer(&self) -> &Buyer {
        &self.buyer
    }

    pub fn line_items(&self) -> &[LineItem] {
        &self.line_items
    }

    pub fn invoice_level_charge(&self) -> f64 {
        self.invoice_level_charge
    }

    pub fn invoice_level_discount(&self) -> f64 {
        self.invoice_level_discount
    }

    pub fn allowance_reason(&self) -> Option<&str> {
        self.allowance_reason.as_deref()
    }

    pub(crate) fn issue_date_string(&self) -> String {
        self.issue_datetime.date_naive().to_string()
    }

    pub(crate) fn issue_time_string(&self) -> String {
        self.issue_datetime.time().format("%H:%M:%SZ").to_string()
    }
}

/// Computed invoice totals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InvoiceTotalsData {
    line_extension: f64,
    tax_amount: f64,
    allowance_total: f64,
    charge_total: f64,
}

impl InvoiceTotalsData {
    pub(crate) fn from_data(data: &InvoiceData) -> Self {
        let line_extension: f64 = data.line_items.iter().map(|li| li.total_amount).sum();
        let tax_amount: f64 = data.line_items.iter().map(|li| li.tax_amount).sum();

        Self {
            line_extension,
            tax_amount,
            allowance_total: data.invoice_level_discount,
            charge_total: data.invoice_level_charge,
        }
    }

    pub fn line_extension(&self) -> f64 {
        self.line_extension
    }

    pub fn tax_amount(&self) -> f64 {
        self.tax_amount
    }

    pub fn allowance_total(&self) -> f64 {
        self.allowance_total
    }

    pub fn charge_total(&self) -> f64 {
        self.charge_total
    }

    pub fn tax_exclusive_amount(&self) -> f64 {
        self.line_extension - self.allowance_total + self.charge_total
    }

    pub fn tax_inclusive_amount(&self) -> f64 {
        self.tax_exclusive_amount() + self.tax_amount
    }
}
