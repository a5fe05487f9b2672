//! Identity and validity fields supplied by the caller before a build
//!
//! These types only describe *what* goes into a certificate; conversion to
//! the X.509 structures happens here so the certificate model stays a thin
//! assembly layer.

use thiserror::Error;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::der::asn1::{Any, GeneralizedTime, ObjectIdentifier, SetOfVec, UtcTime};
use x509_cert::der::{DateTime, Tag};
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::{Time, Validity};

const COUNTRY: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.6");
const STATE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.8");
const LOCALITY: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.7");
const ORGANIZATION: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.10");
const ORGANIZATIONAL_UNIT: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.11");
const COMMON_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");

/// RFC 5280 upper bound on serial number length
pub const MAX_SERIAL_LENGTH: usize = 20;

/// Subject or issuer of a certificate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    pub country: Option<String>,
    pub state: Option<String>,
    pub locality: Option<String>,
    pub organization: Option<String>,
    pub organizational_unit: Option<String>,
    pub common_name: String,
}

impl DistinguishedName {
    pub fn with_common_name(common_name: impl Into<String>) -> Self {
        Self {
            common_name: common_name.into(),
            ..Self::default()
        }
    }

    pub fn organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    pub fn organizational_unit(mut self, unit: impl Into<String>) -> Self {
        self.organizational_unit = Some(unit.into());
        self
    }

    pub fn country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn locality(mut self, locality: impl Into<String>) -> Self {
        self.locality = Some(locality.into());
        self
    }

    pub fn state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn to_x509(&self) -> Result<Name, IdentityError> {
        if self.common_name.is_empty() {
            return Err(IdentityError::EmptyCommonName);
        }

        let mut rdns = Vec::new();
        if let Some(country) = &self.country {
            if country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(IdentityError::InvalidCountry {
                    country: country.clone(),
                });
            }
            rdns.push(rdn(COUNTRY, Tag::PrintableString, country)?);
        }
        let optional = [
            (STATE, &self.state),
            (LOCALITY, &self.locality),
            (ORGANIZATION, &self.organization),
            (ORGANIZATIONAL_UNIT, &self.organizational_unit),
        ];
        for (oid, value) in optional {
            if let Some(value) = value {
                rdns.push(rdn(oid, Tag::Utf8String, value)?);
            }
        }
        rdns.push(rdn(COMMON_NAME, Tag::Utf8String, &self.common_name)?);

        Ok(RdnSequence(rdns))
    }

    pub fn from_x509(name: &Name) -> Self {
        let mut dn = Self::default();
        for atv in name.0.iter().flat_map(|rdn| rdn.0.iter()) {
            let Ok(value) = std::str::from_utf8(atv.value.value()) else {
                continue;
            };
            let value = value.to_string();
            if atv.oid == COMMON_NAME {
                dn.common_name = value;
            } else if atv.oid == COUNTRY {
                dn.country = Some(value);
            } else if atv.oid == STATE {
                dn.state = Some(value);
            } else if atv.oid == LOCALITY {
                dn.locality = Some(value);
            } else if atv.oid == ORGANIZATION {
                dn.organization = Some(value);
            } else if atv.oid == ORGANIZATIONAL_UNIT {
                dn.organizational_unit = Some(value);
            }
        }
        dn
    }
}

fn rdn(
    oid: ObjectIdentifier,
    tag: Tag,
    value: &str,
) -> Result<RelativeDistinguishedName, IdentityError> {
    let invalid = |e: x509_cert::der::Error| IdentityError::InvalidAttribute {
        reason: e.to_string(),
    };
    let atv = AttributeTypeAndValue {
        oid,
        value: Any::new(tag, value.as_bytes()).map_err(invalid)?,
    };
    let set = SetOfVec::try_from(vec![atv]).map_err(invalid)?;
    Ok(RelativeDistinguishedName(set))
}

/// Validity window expressed the way device certificates are issued:
/// an issue instant plus a whole number of years
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidityPeriod {
    pub issue_year: u16,
    pub issue_month: u8,
    pub issue_day: u8,
    pub issue_hour: u8,
    pub expire_years: u8,
}

impl Default for ValidityPeriod {
    fn default() -> Self {
        Self {
            issue_year: 2024,
            issue_month: 1,
            issue_day: 1,
            issue_hour: 0,
            expire_years: 31,
        }
    }
}

impl ValidityPeriod {
    pub fn to_x509(&self) -> Result<Validity, IdentityError> {
        let not_before = self.date_time(self.issue_year)?;
        let expire_year = self
            .issue_year
            .checked_add(u16::from(self.expire_years))
            .ok_or_else(|| IdentityError::InvalidDate {
                reason: "expiry year overflows".to_string(),
            })?;
        let not_after = self.date_time(expire_year)?;

        Ok(Validity {
            not_before: to_time(not_before)?,
            not_after: to_time(not_after)?,
        })
    }

    pub fn from_x509(validity: &Validity) -> Self {
        let not_before = validity.not_before.to_date_time();
        let not_after = validity.not_after.to_date_time();
        Self {
            issue_year: not_before.year(),
            issue_month: not_before.month(),
            issue_day: not_before.day(),
            issue_hour: not_before.hour(),
            expire_years: u8::try_from(not_after.year().saturating_sub(not_before.year()))
                .unwrap_or(u8::MAX),
        }
    }

    fn date_time(&self, year: u16) -> Result<DateTime, IdentityError> {
        let invalid = |e: x509_cert::der::Error| IdentityError::InvalidDate {
            reason: e.to_string(),
        };
        match DateTime::new(
            year,
            self.issue_month,
            self.issue_day,
            self.issue_hour,
            0,
            0,
        ) {
            Ok(dt) => Ok(dt),
            // 29 February rolls back to the 28th in non-leap expiry years
            Err(_) if self.issue_month == 2 && self.issue_day == 29 => {
                DateTime::new(year, 2, 28, self.issue_hour, 0, 0).map_err(invalid)
            }
            Err(e) => Err(invalid(e)),
        }
    }
}

/// RFC 5280: UTCTime through 2049, GeneralizedTime from 2050
fn to_time(dt: DateTime) -> Result<Time, IdentityError> {
    if dt.year() < 2050 {
        let utc = UtcTime::from_date_time(dt).map_err(|e| IdentityError::InvalidDate {
            reason: e.to_string(),
        })?;
        Ok(Time::UtcTime(utc))
    } else {
        Ok(Time::GeneralTime(GeneralizedTime::from_date_time(dt)))
    }
}

/// Positive certificate serial number, minimally encoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateSerial(Vec<u8>);

impl CertificateSerial {
    pub fn new(bytes: &[u8]) -> Result<Self, IdentityError> {
        let start = bytes
            .iter()
            .position(|b| *b != 0)
            .ok_or(IdentityError::InvalidSerial {
                reason: "serial number must be non-zero".to_string(),
            })?;
        let mut serial = bytes[start..].to_vec();
        if serial[0] & 0x80 != 0 {
            serial.insert(0, 0);
        }
        if serial.len() > MAX_SERIAL_LENGTH {
            return Err(IdentityError::InvalidSerial {
                reason: format!(
                    "encoded length {} exceeds {} bytes",
                    serial.len(),
                    MAX_SERIAL_LENGTH
                ),
            });
        }
        Ok(Self(serial))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_x509(&self) -> Result<SerialNumber, IdentityError> {
        SerialNumber::new(&self.0).map_err(|e| IdentityError::InvalidSerial {
            reason: e.to_string(),
        })
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Common name must not be empty")]
    EmptyCommonName,

    #[error("Country must be a two-letter code, got {country:?}")]
    InvalidCountry { country: String },

    #[error("Invalid name attribute: {reason}")]
    InvalidAttribute { reason: String },

    #[error("Invalid validity date: {reason}")]
    InvalidDate { reason: String },

    #[error("Invalid serial number: {reason}")]
    InvalidSerial { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinguished_name_round_trip() {
        let dn = DistinguishedName::with_common_name("0123A5C6D7E8F9AB01")
            .organization("Acme Devices")
            .organizational_unit("Fleet")
            .country("IT");

        let name = dn.to_x509().unwrap();
        assert_eq!(name.0.len(), 4);
        assert_eq!(DistinguishedName::from_x509(&name), dn);
    }

    #[test]
    fn test_distinguished_name_requires_common_name() {
        assert_eq!(
            DistinguishedName::default().to_x509().unwrap_err(),
            IdentityError::EmptyCommonName
        );
    }

    #[test]
    fn test_distinguished_name_rejects_bad_country() {
        let dn = DistinguishedName::with_common_name("device").country("ITA");
        assert!(matches!(
            dn.to_x509(),
            Err(IdentityError::InvalidCountry { .. })
        ));
    }

    #[test]
    fn test_validity_round_trip() {
        let validity = ValidityPeriod {
            issue_year: 2025,
            issue_month: 6,
            issue_day: 15,
            issue_hour: 12,
            expire_years: 10,
        };
        let x509 = validity.to_x509().unwrap();
        assert!(matches!(x509.not_before, Time::UtcTime(_)));
        assert_eq!(ValidityPeriod::from_x509(&x509), validity);
    }

    #[test]
    fn test_validity_beyond_255_years_saturates() {
        let x509 = Validity {
            not_before: Time::UtcTime(
                UtcTime::from_date_time(DateTime::new(2000, 1, 1, 0, 0, 0).unwrap()).unwrap(),
            ),
            not_after: Time::GeneralTime(GeneralizedTime::from_date_time(
                DateTime::new(9999, 12, 31, 23, 59, 59).unwrap(),
            )),
        };
        assert_eq!(ValidityPeriod::from_x509(&x509).expire_years, u8::MAX);
    }

    #[test]
    fn test_validity_switches_to_generalized_time_after_2049() {
        let x509 = ValidityPeriod::default().to_x509().unwrap();
        // 2024 + 31 years
        assert!(matches!(x509.not_after, Time::GeneralTime(_)));
    }

    #[test]
    fn test_validity_leap_day_expiry() {
        let validity = ValidityPeriod {
            issue_year: 2024,
            issue_month: 2,
            issue_day: 29,
            issue_hour: 0,
            expire_years: 1,
        };
        let x509 = validity.to_x509().unwrap();
        assert_eq!(x509.not_after.to_date_time().day(), 28);
    }

    #[test]
    fn test_validity_rejects_invalid_month() {
        let validity = ValidityPeriod {
            issue_month: 13,
            ..ValidityPeriod::default()
        };
        assert!(matches!(
            validity.to_x509(),
            Err(IdentityError::InvalidDate { .. })
        ));
    }

    #[test]
    fn test_serial_is_forced_positive_and_minimal() {
        let serial = CertificateSerial::new(&[0x00, 0x00, 0x9A, 0x01]).unwrap();
        assert_eq!(serial.as_bytes(), &[0x00, 0x9A, 0x01]);
        assert!(serial.to_x509().is_ok());
    }

    #[test]
    fn test_serial_rejects_zero_and_oversize() {
        assert!(CertificateSerial::new(&[0, 0]).is_err());
        assert!(CertificateSerial::new(&[0x80; 20]).is_err());
        assert!(CertificateSerial::new(&[0x7F; 20]).is_ok());
    }
}
