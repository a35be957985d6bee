//! Mapping from invoice records to the UBL document tree.
use super::{
    Address, Contact, InvoiceData, InvoiceError, InvoiceTotalsData, LineItem, Party, PartyRole,
    TaxType,
};
use crate::config::DocumentFamily;
use crate::document::namespaces::Names;
use crate::document::{CleanDocument, Document, Node, Number};

const ROOT: &str = "Invoice";
const TYPE_CODE_LIST_VERSION: &str = "1.0";
const COUNTRY_LIST_ID: &str = "ISO3166-1";
const COUNTRY_LIST_AGENCY: &str = "6";
const TAX_SCHEME_ID: &str = "UN/ECE 5153";
const TAX_SCHEME_AGENCY: &str = "6";
const TAX_SCHEME: &str = "OTH";
const CLASSIFICATION_LIST: &str = "CLASS";
const ADDRESS_LINES: usize = 3;
const NOT_APPLICABLE: &str = "NA";

type Result<T> = std::result::Result<T, InvoiceError>;

/// Builds the clean (unsigned) document for one family.
///
/// Optional business fields the platform still expects are written as empty-but-present
/// leaves, so both families share one tree shape.
#[derive(Debug, Clone, Copy)]
pub struct DocumentBuilder {
    names: Names,
}

impl DocumentBuilder {
    pub fn new(family: DocumentFamily) -> Self {
        Self {
            names: Names::new(family),
        }
    }

    pub fn family(&self) -> DocumentFamily {
        self.names.family()
    }

    pub fn build(&self, invoice: &InvoiceData) -> Result<CleanDocument> {
        let n = &self.names;
        let totals = InvoiceTotalsData::from_data(invoice);
        let currency = invoice.currency().code();

        let mut root = n
            .root_attributes()
            .into_iter()
            .fold(Node::element(), |node, (name, value)| node.with_attribute(name, value))
            .with_field(n.cbc("ID"), Node::text(invoice.id()))
            .with_field(n.cbc("IssueDate"), Node::text(invoice.issue_date_string()))
            .with_field(n.cbc("IssueTime"), Node::text(invoice.issue_time_string()))
            .with_field(
                n.cbc("InvoiceTypeCode"),
                Node::text(invoice.document_type().code())
                    .with_attribute("listVersionID", TYPE_CODE_LIST_VERSION),
            )
            .with_field(n.cbc("DocumentCurrencyCode"), Node::text(currency))
            .with_field(n.cbc("TaxCurrencyCode"), Node::text(currency));

        if let Some(original) = invoice.document_type().original() {
            root.push_field(
                n.cac("BillingReference"),
                Node::element().with_field(
                    n.cac("InvoiceDocumentReference"),
                    Node::element()
                        .with_field(n.cbc("ID"), Node::text(original.id()))
                        .with_field(
                            n.cbc("UUID"),
                            original.uuid().map_or_else(Node::empty, Node::text),
                        ),
                ),
            );
        }

        root.push_field(
            n.cac("AccountingSupplierParty"),
            Node::element().with_field(n.cac("Party"), self.party(invoice.supplier())),
        );
        root.push_field(
            n.cac("AccountingCustomerParty"),
            Node::element().with_field(n.cac("Party"), self.party(invoice.buyer())),
        );

        if invoice.invoice_level_discount() != 0.0 {
            root.push_field(
                n.cac("AllowanceCharge"),
                self.allowance_charge(
                    false,
                    invoice.allowance_reason().unwrap_or("discount"),
                    invoice.invoice_level_discount(),
                    currency,
                )?,
            );
        }
        if invoice.invoice_level_charge() != 0.0 {
            root.push_field(
                n.cac("AllowanceCharge"),
                self.allowance_charge(true, "charge", invoice.invoice_level_charge(), currency)?,
            );
        }

        root.push_field(n.cac("TaxTotal"), self.tax_total(invoice, &totals, currency)?);
        root.push_field(n.cac("LegalMonetaryTotal"), self.monetary_total(&totals, currency)?);

        for (index, item) in invoice.line_items().iter().enumerate() {
            root.push_field(n.cac("InvoiceLine"), self.line(index + 1, item, currency)?);
        }

        log::debug!(
            "built {} document {} with {} line(s)",
            self.family(),
            invoice.id(),
            invoice.line_items().len()
        );
        Ok(CleanDocument::from_built(Document::new(ROOT, root)))
    }

    fn party<R: PartyRole>(&self, party: &Party<R>) -> Node {
        let n = &self.names;
        let mut node = Node::element();
        if let Some(classification) = party.industry_classification() {
            node.push_field(
                n.cbc("IndustryClassificationCode"),
                Node::text(&classification.code).with_attribute("name", &classification.description),
            );
        }

        let registration = party.registration();
        let identifiers = [
            ("TIN", party.tin()),
            (registration.scheme().as_str(), registration.as_str()),
            ("SST", party.sst_registration().unwrap_or(NOT_APPLICABLE)),
        ];
        for (scheme, value) in identifiers {
            node.push_field(
                n.cac("PartyIdentification"),
                Node::element().with_field(n.cbc("ID"), id_with_scheme(scheme, value)),
            );
        }

        node.with_field(n.cac("PostalAddress"), self.address(party.address()))
            .with_field(
                n.cac("PartyLegalEntity"),
                Node::element().with_field(n.cbc("RegistrationName"), Node::text(party.name())),
            )
            .with_field(n.cac("Contact"), self.contact(party.contact()))
    }

    fn address(&self, address: &Address) -> Node {
        let n = &self.names;
        let lines = (0..ADDRESS_LINES)
            .map(|index| {
                Node::element().with_field(n.cbc("Line"), Node::text(address.line(index)))
            })
            .collect();
        Node::element()
            .with_field(n.cbc("CityName"), Node::text(address.city()))
            .with_field(n.cbc("PostalZone"), Node::text(address.postal_code()))
            .with_field(n.cbc("CountrySubentityCode"), Node::text(address.state_code()))
            .with_fields(n.cac("AddressLine"), lines)
            .with_field(
                n.cac("Country"),
                Node::element().with_field(
                    n.cbc("IdentificationCode"),
                    Node::text(address.country_code().alpha3())
                        .with_attribute("listID", COUNTRY_LIST_ID)
                        .with_attribute("listAgencyID", COUNTRY_LIST_AGENCY),
                ),
            )
    }

    fn contact(&self, contact: &Contact) -> Node {
        let n = &self.names;
        let leaf = |value: &Option<String>| value.as_deref().map_or_else(Node::empty, Node::text);
        Node::element()
            .with_field(n.cbc("Telephone"), leaf(&contact.telephone))
            .with_field(n.cbc("ElectronicMail"), leaf(&contact.email))
    }

    fn allowance_charge(
        &self,
        charge: bool,
        reason: &str,
        amount: f64,
        currency: &str,
    ) -> Result<Node> {
        let n = &self.names;
        Ok(Node::element()
            .with_field(n.cbc("ChargeIndicator"), Node::boolean(charge))
            .with_field(n.cbc("AllowanceChargeReason"), Node::text(reason))
            .with_field(n.cbc("Amount"), currency_amount("allowance_charge", amount, currency)?))
    }

    fn tax_total(
        &self,
        invoice: &InvoiceData,
        totals: &InvoiceTotalsData,
        currency: &str,
    ) -> Result<Node> {
        let n = &self.names;
        let mut subtotals: Vec<(TaxType, f64, f64)> = Vec::new();
        for item in invoice.line_items() {
            match subtotals.iter_mut().find(|(tax_type, ..)| *tax_type == item.tax_type()) {
                Some((_, taxable, tax)) => {
                    *taxable += item.total_amount();
                    *tax += item.tax_amount();
                }
                None => subtotals.push((item.tax_type(), item.total_amount(), item.tax_amount())),
            }
        }

        let mut node = Node::element()
            .with_field(n.cbc("TaxAmount"), currency_amount("tax_amount", totals.tax_amount(), currency)?);
        for (tax_type, taxable, tax) in subtotals {
            node.push_field(
                n.cac("TaxSubtotal"),
                Node::element()
                    .with_field(n.cbc("TaxableAmount"), currency_amount("taxable_amount", taxable, currency)?)
                    .with_field(n.cbc("TaxAmount"), currency_amount("tax_amount", tax, currency)?)
                    .with_field(n.cac("TaxCategory"), self.tax_category(tax_type)),
            );
        }
        Ok(node)
    }

    fn tax_category(&self, tax_type: TaxType) -> Node {
        let n = &self.names;
        Node::element()
            .with_field(n.cbc("ID"), Node::text(tax_type.code()))
            .with_field(
                n.cac("TaxScheme"),
                Node::element().with_field(
                    n.cbc("ID"),
                    Node::text(TAX_SCHEME)
                        .with_attribute("schemeID", TAX_SCHEME_ID)
                        .with_attribute("schemeAgencyID", TAX_SCHEME_AGENCY),
                ),
            )
    }

    fn monetary_total(&self, totals: &InvoiceTotalsData, currency: &str) -> Result<Node> {
        let n = &self.names;
        let amounts = [
            ("LineExtensionAmount", totals.line_extension()),
            ("TaxExclusiveAmount", totals.tax_exclusive_amount()),
            ("TaxInclusiveAmount", totals.tax_inclusive_amount()),
            ("AllowanceTotalAmount", totals.allowance_total()),
            ("ChargeTotalAmount", totals.charge_total()),
            ("PayableAmount", totals.tax_inclusive_amount()),
        ];
        amounts
            .into_iter()
            .try_fold(Node::element(), |node, (name, value)| {
                Ok(node.with_field(n.cbc(name), currency_amount("monetary_total", value, currency)?))
            })
    }

    fn line(&self, index: usize, item: &LineItem, currency: &str) -> Result<Node> {
        let n = &self.names;
        let quantity = Number::from_f64(item.quantity(), 6).map_err(|_| InvoiceError::InvalidAmount {
            field: "quantity",
            value: item.quantity(),
        })?;
        let tax_rate = Number::from_f64(item.tax_rate(), 2).map_err(|_| InvoiceError::InvalidAmount {
            field: "tax_rate",
            value: item.tax_rate(),
        })?;

        let tax_total = Node::element()
            .with_field(n.cbc("TaxAmount"), currency_amount("tax_amount", item.tax_amount(), currency)?)
            .with_field(
                n.cac("TaxSubtotal"),
                Node::element()
                    .with_field(
                        n.cbc("TaxableAmount"),
                        currency_amount("taxable_amount", item.total_amount(), currency)?,
                    )
                    .with_field(n.cbc("TaxAmount"), currency_amount("tax_amount", item.tax_amount(), currency)?)
                    .with_field(n.cbc("Percent"), Node::number(tax_rate))
                    .with_field(n.cac("TaxCategory"), self.tax_category(item.tax_type())),
            );

        let line_item = Node::element()
            .with_field(
                n.cac("CommodityClassification"),
                Node::element().with_field(
                    n.cbc("ItemClassificationCode"),
                    Node::text(item.classification()).with_attribute("listID", CLASSIFICATION_LIST),
                ),
            )
            .with_field(n.cbc("Description"), Node::text(item.description()));

        Ok(Node::element()
            .with_field(n.cbc("ID"), Node::text(index.to_string()))
            .with_field(
                n.cbc("InvoicedQuantity"),
                Node::number(quantity).with_attribute("unitCode", item.unit_code()),
            )
            .with_field(
                n.cbc("LineExtensionAmount"),
                currency_amount("line_extension", item.total_amount(), currency)?,
            )
            .with_field(n.cac("TaxTotal"), tax_total)
            .with_field(n.cac("Item"), line_item)
            .with_field(
                n.cac("Price"),
                Node::element().with_field(
                    n.cbc("PriceAmount"),
                    currency_amount("unit_price", item.unit_price(), currency)?,
                ),
            )
            .with_field(
                n.cac("ItemPriceExtension"),
                Node::element().with_field(
                    n.cbc("Amount"),
                    currency_amount("line_extension", item.total_amount(), currency)?,
                ),
            ))
    }
}

fn currency_amount(field: &'static str, value: f64, currency: &str) -> Result<Node> {
    let amount =
        Number::from_f64(value, 2).map_err(|_| InvoiceError::InvalidAmount { field, value })?;
    Ok(Node::number(amount).with_attribute("currencyID", currency))
}

fn id_with_scheme(scheme: &str, value: &str) -> Node {
    Node::text(value).with_attribute("schemeID", scheme)
}
