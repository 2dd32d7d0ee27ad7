//! PBEWithMD5AndDES as defined by PKCS#5 v1.5

use super::Error;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use des::Des;

type DesCbcEnc = cbc::Encryptor<Des>;
type DesCbcDec = cbc::Decryptor<Des>;

const SALT: [u8; 8] = [0xC7, 0x73, 0x21, 0x8C, 0x7E, 0xC8, 0xEE, 0x99];
const ITERATIONS: usize = 20;

/// MD5 over password and salt, then repeatedly over the digest
fn derive_key_iv(password: &str) -> ([u8; 8], [u8; 8]) {
    let mut seed = password.as_bytes().to_vec();
    seed.extend_from_slice(&SALT);
    let mut digest = md5::compute(&seed);
    for _ in 1..ITERATIONS {
        digest = md5::compute(digest.0);
    }

    let mut key = [0u8; 8];
    let mut iv = [0u8; 8];
    key.copy_from_slice(&digest.0[0..8]);
    iv.copy_from_slice(&digest.0[8..16]);
    (key, iv)
}

pub(super) fn encrypt(password: &str, plain: &[u8]) -> Result<Vec<u8>, Error> {
    let (key, iv) = derive_key_iv(password);
    let cipher =
        DesCbcEnc::new_from_slices(&key, &iv).map_err(|e| Error::Cipher(e.to_string()))?;
    Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(plain))
}

pub(super) fn decrypt(password: &str, data: &[u8]) -> Result<Vec<u8>, Error> {
    let (key, iv) = derive_key_iv(password);
    let cipher =
        DesCbcDec::new_from_slices(&key, &iv).map_err(|e| Error::Cipher(e.to_string()))?;
    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(data)
        .map_err(|_| Error::Cipher("bad padding, most likely a wrong password".to_string()))
}

#[test]
fn test_pbe_sample() {
    let sample = include_bytes!("samples/passwords_sample.bin");
    let plain = decrypt("phinmsx", &sample[..]).unwrap();
    assert!(plain.starts_with(b"<?xml"));
    assert!(plain.ends_with(b"</passwordFile>"));

    assert_eq!(encrypt("phinmsx", &plain).unwrap(), &sample[..]);
}

#[test]
fn test_pbe_wrong_password() {
    let sample = include_bytes!("samples/passwords_sample.bin");
    // A wrong key yields garbage that almost never carries valid padding
    let result = decrypt("not the password", &sample[..]);
    assert!(matches!(result, Err(Error::Cipher(_))));
}
