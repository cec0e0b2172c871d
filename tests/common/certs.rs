use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::ec::EcGroup;
use openssl::ec::EcKey;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::PKey;
use openssl::pkey::Private;
use openssl::x509::X509Builder;
use openssl::x509::X509NameBuilder;

pub const NOT_BEFORE: i64 = 1_767_225_600; // 2026-01-01T00:00:00Z
pub const NOT_AFTER: i64 = 1_774_915_200; // 2026-03-31T00:00:00Z

pub fn p256_key() -> PKey<Private> {
  let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
  PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
}

pub fn p256_key_pem() -> String {
  String::from_utf8(p256_key().private_key_to_pem_pkcs8().unwrap()).unwrap()
}

/// A self-signed certificate with the given issuer organization and common
/// name, valid from [`NOT_BEFORE`] to [`NOT_AFTER`].
pub fn certificate_pem(organization: &str, common_name: &str) -> String {
  let key = p256_key();

  let mut name = X509NameBuilder::new().unwrap();
  name.append_entry_by_text("O", organization).unwrap();
  name.append_entry_by_text("CN", common_name).unwrap();
  let name = name.build();

  let mut builder = X509Builder::new().unwrap();
  builder.set_version(2).unwrap();
  let serial = BigNum::from_u32(42).unwrap().to_asn1_integer().unwrap();
  builder.set_serial_number(&serial).unwrap();
  builder.set_subject_name(&name).unwrap();
  builder.set_issuer_name(&name).unwrap();
  builder.set_pubkey(&key).unwrap();
  builder
    .set_not_before(&Asn1Time::from_unix(NOT_BEFORE).unwrap())
    .unwrap();
  builder
    .set_not_after(&Asn1Time::from_unix(NOT_AFTER).unwrap())
    .unwrap();
  builder.sign(&key, MessageDigest::sha256()).unwrap();

  String::from_utf8(builder.build().to_pem().unwrap()).unwrap()
}
