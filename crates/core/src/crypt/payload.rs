use super::envelope::EncryptedData;
use super::keystore::{self, Keystore};
use super::Error;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use des::TdesEde3;
use log::*;
use rand::RngCore;
use rsa::Pkcs1v15Encrypt;
use std::path::Path;

type TdesCbcEnc = cbc::Encryptor<TdesEde3>;
type TdesCbcDec = cbc::Decryptor<TdesEde3>;

const KEY_LEN: usize = 24;
const IV_LEN: usize = 8;

/// Decrypts an envelope with the matching private key from a keystore file
///
/// The store password opens the keystore and the key password opens the private key.
pub fn decrypt<P: AsRef<Path>>(
    keystore_path: P,
    store_password: &str,
    key_password: &str,
    envelope: &[u8],
) -> Result<Vec<u8>, Error> {
    let envelope = EncryptedData::try_parse(envelope)?;
    let key_name = envelope.key_name()?;
    let wrapped_key = envelope.wrapped_key()?;
    let cipher_value = envelope.cipher_value()?;

    let keystore = Keystore::load(keystore_path, store_password)?;
    decrypt_with(&keystore, key_password, key_name, wrapped_key, cipher_value)
}

/// Decrypts a parsed envelope's parts with an already opened keystore
pub fn decrypt_with(
    keystore: &Keystore,
    key_password: &str,
    key_name: &str,
    wrapped_key: &str,
    cipher_value: &str,
) -> Result<Vec<u8>, Error> {
    let private_key = keystore.private_key(key_name, key_password)?;

    let wrapped = decode_base64(wrapped_key).map_err(Error::KeyUnwrapFailed)?;
    let key = private_key
        .decrypt(Pkcs1v15Encrypt, &wrapped)
        .map_err(|e| Error::KeyUnwrapFailed(e.to_string()))?;
    if key.len() != KEY_LEN {
        return Err(Error::KeyUnwrapFailed(format!(
            "expected a {} byte key but got {}",
            KEY_LEN,
            key.len()
        )));
    }

    let data = decode_base64(cipher_value).map_err(Error::PayloadDecryptFailed)?;
    if data.len() <= IV_LEN {
        return Err(Error::PayloadDecryptFailed(
            "cipher text shorter than its IV".to_string(),
        ));
    }
    let (iv, cipher_text) = data.split_at(IV_LEN);
    let plain = TdesCbcDec::new_from_slices(&key, iv)
        .map_err(|e| Error::PayloadDecryptFailed(e.to_string()))?
        .decrypt_padded_vec_mut::<Pkcs7>(cipher_text)
        .map_err(|_| Error::PayloadDecryptFailed("bad padding".to_string()))?;
    debug!("Decrypted {} payload bytes for {}", plain.len(), key_name);
    Ok(plain)
}

/// Encrypts a payload returning the envelope and the key name it was wrapped for
///
/// With a password the first entry of the keystore at `keystore_path` is used, otherwise
/// the path is read as a bare certificate in PEM or DER form.
pub fn encrypt<P: AsRef<Path>>(
    keystore_path: P,
    keystore_password: Option<&str>,
    payload: &[u8],
) -> Result<(Vec<u8>, String), Error> {
    let path = keystore_path.as_ref();
    let cert = match keystore_password {
        Some(password) => Keystore::load(path, password)?.first_certificate()?,
        None => keystore::read_certificate(&std::fs::read(path)?)?,
    };
    let key_name = keystore::subject_name(&cert);
    let public_key = keystore::public_key(&cert)?;

    let mut rng = rand::thread_rng();
    let mut key = [0u8; KEY_LEN];
    rng.fill_bytes(&mut key);
    set_odd_parity(&mut key);
    let mut iv = [0u8; IV_LEN];
    rng.fill_bytes(&mut iv);

    let cipher_text = TdesCbcEnc::new_from_slices(&key, &iv)
        .map_err(|e| Error::Encrypt(e.to_string()))?
        .encrypt_padded_vec_mut::<Pkcs7>(payload);
    let mut data = iv.to_vec();
    data.extend_from_slice(&cipher_text);

    let wrapped = public_key
        .encrypt(&mut rng, Pkcs1v15Encrypt, &key)
        .map_err(|e| Error::Encrypt(e.to_string()))?;

    let envelope = EncryptedData::new(&key_name, STANDARD.encode(wrapped), STANDARD.encode(data));
    debug!("Encrypted {} payload bytes for {}", payload.len(), key_name);
    Ok((envelope.serialize(vec![])?, key_name))
}

/// DES keys carry an odd parity bit in the low bit of every byte
fn set_odd_parity(key: &mut [u8]) {
    for b in key.iter_mut() {
        let high = *b & 0xfe;
        *b = if high.count_ones() % 2 == 0 {
            high | 1
        } else {
            high
        };
    }
}

fn decode_base64(value: &str) -> Result<Vec<u8>, String> {
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(compact).map_err(|e| e.to_string())
}
