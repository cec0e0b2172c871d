use super::error::*;
use data_encoding::BASE64URL_NOPAD;
use openssl::bn::BigNumContext;
use openssl::ecdsa::EcdsaSig;
use openssl::hash::hash;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::Id;
use openssl::pkey::PKey;
use openssl::pkey::Private;
use openssl::sign::Signer;
use serde::Serialize;
use serde_json::json;

pub(crate) fn b64(data: &[u8]) -> String {
  BASE64URL_NOPAD.encode(data)
}

#[derive(Serialize, Clone, Default)]
struct JwsHeader {
  nonce: String,
  alg: &'static str,
  url: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  kid: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  jwk: Option<Jwk>,
}

/// The public part of an account key. Members are declared in lexicographic
/// order, which makes the serialized form usable for RFC 7638 thumbprints.
#[derive(Serialize, Clone, Debug, Eq, PartialEq)]
#[serde(untagged)]
pub(crate) enum Jwk {
  Ec {
    crv: &'static str,
    kty: &'static str,
    x: String,
    y: String,
  },
  Rsa {
    e: String,
    kty: &'static str,
    n: String,
  },
}

impl Jwk {
  pub fn new(pkey: &PKey<Private>) -> Result<Jwk, ProtocolError> {
    match pkey.id() {
      Id::RSA => {
        let rsa = pkey.rsa()?;
        Ok(Jwk::Rsa {
          e: b64(&rsa.e().to_vec()),
          kty: "RSA",
          n: b64(&rsa.n().to_vec()),
        })
      }
      Id::EC => {
        let ec = pkey.ec_key()?;
        let mut ctx = BigNumContext::new()?;
        let mut x = openssl::bn::BigNum::new()?;
        let mut y = openssl::bn::BigNum::new()?;
        ec.public_key()
          .affine_coordinates(ec.group(), &mut x, &mut y, &mut ctx)?;
        Ok(Jwk::Ec {
          crv: "P-256",
          kty: "EC",
          x: b64(&x.to_vec_padded(32)?),
          y: b64(&y.to_vec_padded(32)?),
        })
      }
      _ => Err(validation_err("unsupported account key type")),
    }
  }

  /// The base64url encoded SHA-256 thumbprint of this key.
  pub fn thumbprint(&self) -> Result<String, ProtocolError> {
    let json = serde_json::to_vec(self)?;
    Ok(b64(&hash(MessageDigest::sha256(), &json)?))
  }
}

/// Checks that `pkey` can sign ACME requests.
pub(crate) fn check_account_key(
  pkey: &PKey<Private>,
) -> Result<(), ProtocolError> {
  match pkey.id() {
    Id::RSA => Ok(()),
    Id::EC => {
      let curve = pkey.ec_key()?.group().curve_name();
      if curve == Some(Nid::X9_62_PRIME256V1) {
        Ok(())
      } else {
        Err(validation_err("only P-256 EC account keys are supported"))
      }
    }
    _ => Err(validation_err("account key must be an RSA or EC key")),
  }
}

fn sign(
  pkey: &PKey<Private>,
  signing_input: &[u8],
) -> Result<Vec<u8>, ProtocolError> {
  let mut signer = Signer::new(MessageDigest::sha256(), pkey)?;
  signer.update(signing_input)?;
  let signature = signer.sign_to_vec()?;

  match pkey.id() {
    Id::EC => {
      // JWS wants the fixed size r || s form, not DER.
      let sig = EcdsaSig::from_der(&signature)?;
      let mut raw = sig.r().to_vec_padded(32)?;
      raw.extend(sig.s().to_vec_padded(32)?);
      Ok(raw)
    }
    _ => Ok(signature),
  }
}

/// Produces a flattened JWS for `payload`. Without an account id the
/// public key itself is embedded.
pub(crate) fn jws(
  url: &str,
  nonce: String,
  payload: &str,
  pkey: &PKey<Private>,
  account_id: Option<&str>,
) -> Result<String, ProtocolError> {
  let payload_b64 = b64(payload.as_bytes());

  let alg = match pkey.id() {
    Id::RSA => "RS256",
    Id::EC => "ES256",
    _ => return Err(validation_err("unsupported account key type")),
  };

  let mut header = JwsHeader {
    nonce,
    alg,
    url: url.to_string(),
    ..Default::default()
  };

  if let Some(kid) = account_id {
    header.kid = Some(kid.to_string());
  } else {
    header.jwk = Some(Jwk::new(pkey)?);
  }

  let protected_b64 = b64(&serde_json::to_vec(&header)?);
  let signature_b64 = b64(&sign(
    pkey,
    format!("{}.{}", protected_b64, payload_b64).as_bytes(),
  )?);

  Ok(serde_json::to_string(&json!({
    "protected": protected_b64,
    "payload": payload_b64,
    "signature": signature_b64
  }))?)
}
