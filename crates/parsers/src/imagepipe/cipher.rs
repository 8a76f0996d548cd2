// ABOUTME: Key material extraction and AES-CBC decryption of the image list payload.
// ABOUTME: Key size picks AES-128/192/256; zero-padded payloads fall back to no-padding mode.

use aes::{Aes128, Aes192, Aes256};
use cbc::cipher::block_padding::{NoPadding, Pkcs7};
use cbc::cipher::{BlockCipher, BlockDecryptMut, KeyInit, KeyIvInit};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::error::{ParserError, Result};

static HEX_VARIABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"var\s+(\w+)\s*=\s*CryptoJS\.enc\.Hex\.parse\(\s*["']([0-9a-zA-Z]*)["']\s*\)"#)
        .unwrap()
});

/// The hex string assigned to `var <name> = CryptoJS.enc.Hex.parse("…")`.
pub fn find_hex_variable<'a>(script: &'a str, name: &str) -> Option<&'a str> {
    HEX_VARIABLE
        .captures_iter(script)
        .find(|c| &c[1] == name)
        .and_then(|c| c.get(2))
        .map(|m| m.as_str())
}

/// Reads and hex-decodes one key variable from the deobfuscated script.
pub fn key_material(script: &str, name: &str, url: &str) -> Result<Vec<u8>> {
    let hex_value = find_hex_variable(script, name).ok_or_else(|| {
        ParserError::format(
            url,
            format!("{} variable", name),
            Some(anyhow::anyhow!("CryptoJS.enc.Hex.parse assignment not found")),
        )
    })?;
    hex::decode(hex_value).map_err(|e| {
        ParserError::decode(url, format!("{} variable", name), Some(anyhow::anyhow!(e)))
    })
}

/// Decrypts `data` with AES-CBC and decodes the plaintext as UTF-8.
pub fn decrypt(key: &[u8], iv: &[u8], data: &[u8], url: &str) -> Result<String> {
    let plain = match key.len() {
        16 => decrypt_with::<Aes128>(key, iv, data),
        24 => decrypt_with::<Aes192>(key, iv, data),
        32 => decrypt_with::<Aes256>(key, iv, data),
        n => Err(anyhow::anyhow!("unsupported AES key length {}", n)),
    }
    .map_err(|e| ParserError::decode(url, "aes-cbc", Some(e)))?;

    String::from_utf8(plain).map_err(|e| {
        ParserError::decode(url, "aes-cbc plaintext", Some(anyhow::anyhow!(e)))
    })
}

fn decrypt_with<C>(key: &[u8], iv: &[u8], data: &[u8]) -> anyhow::Result<Vec<u8>>
where
    C: BlockCipher + BlockDecryptMut + KeyInit,
{
    let decryptor = || {
        cbc::Decryptor::<C>::new_from_slices(key, iv)
            .map_err(|_| anyhow::anyhow!("invalid key or iv length"))
    };
    match decryptor()?.decrypt_padded_vec_mut::<Pkcs7>(data) {
        Ok(plain) => Ok(plain),
        Err(_) => {
            debug!("PKCS7 unpadding failed, retrying without padding");
            let mut plain = decryptor()?
                .decrypt_padded_vec_mut::<NoPadding>(data)
                .map_err(|_| anyhow::anyhow!("ciphertext is not a whole number of blocks"))?;
            while plain.last() == Some(&0) {
                plain.pop();
            }
            Ok(plain)
        }
    }
}
