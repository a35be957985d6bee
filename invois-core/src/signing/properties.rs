//! Signed properties: signing time and the signer certificate identity.
use crate::credentials::SigningCredentials;
use crate::digest::Digest;
use crate::document::namespaces::Names;
use crate::document::Node;
use crate::signing::template::{SHA256_URI, SIGNED_PROPERTIES_ID};
use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use std::fmt;

const SIGNING_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// UTC signing time truncated to whole seconds.
///
/// # Examples
/// ```rust
/// use invois_core::signing::properties::SigningTime;
///
/// let time = SigningTime::parse("2024-07-01T08:30:00Z")?;
/// assert_eq!(time.to_string(), "2024-07-01T08:30:00Z");
/// # Ok::<(), chrono::ParseError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SigningTime(DateTime<Utc>);

impl SigningTime {
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    pub fn from_datetime(time: DateTime<Utc>) -> Self {
        Self(time.trunc_subsecs(0))
    }

    pub fn parse(text: &str) -> Result<Self, chrono::ParseError> {
        NaiveDateTime::parse_from_str(text, SIGNING_TIME_FORMAT)
            .map(|naive| Self(naive.and_utc()))
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }
}

impl fmt::Display for SigningTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(SIGNING_TIME_FORMAT))
    }
}

/// Values recorded inside the signed properties element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPropertiesData {
    certificate_digest: Digest,
    signing_time: SigningTime,
    issuer_name: String,
    serial_number: String,
}

impl SignedPropertiesData {
    pub fn new(credentials: &SigningCredentials, signing_time: SigningTime) -> Self {
        Self {
            certificate_digest: *credentials.certificate_digest(),
            signing_time,
            issuer_name: credentials.issuer_name().to_string(),
            serial_number: credentials.serial_number().to_string(),
        }
    }

    pub fn certificate_digest(&self) -> &Digest {
        &self.certificate_digest
    }

    pub fn signing_time(&self) -> SigningTime {
        self.signing_time
    }

    pub fn issuer_name(&self) -> &str {
        &self.issuer_name
    }

    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    pub(crate) fn to_node(&self, names: &Names) -> Node {
        let cert = Node::element()
            .with_field(
                names.xades("CertDigest"),
                Node::element()
                    .with_field(
                        names.ds("DigestMethod"),
                        Node::empty().with_attribute("Algorithm", SHA256_URI),
                    )
                    .with_field(
                        names.ds("DigestValue"),
                        Node::text(self.certificate_digest.to_base64()),
                    ),
            )
            .with_field(
                names.xades("IssuerSerial"),
                Node::element()
                    .with_field(names.ds("X509IssuerName"), Node::text(&self.issuer_name))
                    .with_field(
                        names.ds("X509SerialNumber"),
                        Node::text(&self.serial_number),
                    ),
            );

        Node::element()
            .with_attribute("Id", SIGNED_PROPERTIES_ID)
            .with_field(
                names.xades("SignedSignatureProperties"),
                Node::element()
                    .with_field(
                        names.xades("SigningTime"),
                        Node::text(self.signing_time.to_string()),
                    )
                    .with_field(
                        names.xades("SigningCertificate"),
                        Node::element().with_field(names.xades("Cert"), cert),
                    ),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn signing_time_drops_subseconds() {
        let precise = Utc
            .with_ymd_and_hms(2024, 7, 1, 8, 30, 15)
            .single()
            .expect("valid time")
            + chrono::Duration::milliseconds(987);
        let time = SigningTime::from_datetime(precise);
        assert_eq!(time.to_string(), "2024-07-01T08:30:15Z");
        assert_eq!(SigningTime::parse("2024-07-01T08:30:15Z").expect("parse"), time);
    }

    #[test]
    fn signing_time_rejects_other_formats() {
        assert!(SigningTime::parse("2024-07-01 08:30:15").is_err());
        assert!(SigningTime::parse("2024-07-01T08:30:15.5Z").is_err());
    }
}
