use crate::error::Error;
use chrono::DateTime;
use chrono::Utc;
use openssl::asn1::Asn1Time;
use openssl::asn1::Asn1TimeRef;
use openssl::nid::Nid;
use openssl::x509::X509NameRef;
use openssl::x509::X509;

/// Validity window and issuer of a certificate, as issued by the CA.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CertificateMetadata {
  pub not_before: DateTime<Utc>,
  pub not_after: DateTime<Utc>,
  pub issuer_common_name: String,
  pub issuer_organization: String,
}

impl CertificateMetadata {
  /// Parses the leading certificate of a PEM encoded chain.
  pub fn from_pem(pem: &[u8]) -> Result<Self, Error> {
    if pem.iter().all(u8::is_ascii_whitespace) {
      return Err(Error::cert_parse("no PEM block found"));
    }
    let cert = X509::from_pem(pem).map_err(Error::cert_parse)?;
    Self::from_x509(&cert)
  }

  pub fn from_x509(cert: &X509) -> Result<Self, Error> {
    let issuer = cert.issuer_name();

    let issuer_common_name =
      first_entry(issuer, Nid::COMMONNAME)?.unwrap_or_default();
    let issuer_organization = first_entry(issuer, Nid::ORGANIZATIONNAME)?
      .filter(|organization| !organization.is_empty())
      .ok_or_else(|| {
        Error::cert_parse("certificate issuer has no organization")
      })?;

    Ok(CertificateMetadata {
      not_before: to_utc(cert.not_before())?,
      not_after: to_utc(cert.not_after())?,
      issuer_common_name,
      issuer_organization,
    })
  }
}

fn first_entry(name: &X509NameRef, nid: Nid) -> Result<Option<String>, Error> {
  match name.entries_by_nid(nid).next() {
    Some(entry) => {
      let value = entry.data().as_utf8().map_err(Error::cert_parse)?;
      Ok(Some(value.to_string()))
    }
    None => Ok(None),
  }
}

fn to_utc(time: &Asn1TimeRef) -> Result<DateTime<Utc>, Error> {
  let epoch = Asn1Time::from_unix(0).map_err(Error::cert_parse)?;
  let diff = epoch.diff(time).map_err(Error::cert_parse)?;
  let secs = i64::from(diff.days) * 86_400 + i64::from(diff.secs);
  DateTime::from_timestamp(secs, 0)
    .ok_or_else(|| Error::cert_parse("certificate time out of range"))
}
