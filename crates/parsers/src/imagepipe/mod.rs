// ABOUTME: The obfuscated image pipeline: encrypted image list in the page, keys in a sojson script.
// ABOUTME: Runs payload extraction, deobfuscation, AES-CBC decryption, unscrambling and key injection.

//! Obfuscated image list decoding.
//!
//! A chapter page embeds `var imgsrcs = '<base64>'` and loads a `chapter.js` wrapped by the
//! sojson.v4 obfuscator. The deobfuscated script carries the AES key and IV as hex strings,
//! the positions of digits that were spliced into the plaintext, and a render function from
//! which per-image descrambling keys are computed.
//!
//! The pass is single-shot: any failing stage fails the whole chapter.

pub mod cipher;
pub mod script;
pub mod sojson;
pub mod unscramble;

use std::sync::Arc;

use base64::Engine as _;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::dom;
use crate::error::{ParserError, Result};
use crate::http::HttpClient;
use crate::model::MangaPage;

pub use script::{QuickJsEvaluator, ScriptEvaluator};

static IMGSRCS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"var\s+imgsrcs\s*=\s*['"]([a-zA-Z0-9+=/]+)['"]"#).unwrap());

const SCRAMBLED_HOST_MARKER: &str = "cspiclink";

/// What the chapter page itself yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterPayload {
    /// Base64 ciphertext of the comma-separated image list.
    pub imgsrcs: String,
    /// Absolute url of the obfuscated `chapter.js`.
    pub script_url: String,
}

/// Finds the encrypted image list and the key script in a chapter page.
pub fn extract_payload(html: &str, page_url: &str) -> Result<ChapterPayload> {
    let doc = dom::parse_document(html);
    let imgsrcs = dom::inline_scripts(&doc)
        .iter()
        .find_map(|s| IMGSRCS.captures(s).map(|c| c[1].to_string()))
        .ok_or_else(|| ParserError::not_found(page_url, "script var imgsrcs"))?;

    let script_src = dom::select_all(doc.root_element(), "script[src]")
        .into_iter()
        .filter_map(|el| dom::attr(el, "src"))
        .find(|src| src.to_ascii_lowercase().contains("chapter.js"))
        .ok_or_else(|| ParserError::not_found(page_url, "script[src*=chapter.js]"))?;

    let script_url = url::Url::parse(page_url)
        .and_then(|base| base.join(script_src))
        .map(|u| u.to_string())
        .map_err(|e| ParserError::invalid_url(script_src, "chapter.js", Some(anyhow::anyhow!(e))))?;

    Ok(ChapterPayload {
        imgsrcs,
        script_url,
    })
}

/// Decodes the image list given the base64 payload and the raw (obfuscated) `chapter.js`.
#[derive(Clone)]
pub struct ImagePipeline {
    evaluator: Arc<dyn ScriptEvaluator>,
}

impl std::fmt::Debug for ImagePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImagePipeline").finish_non_exhaustive()
    }
}

impl Default for ImagePipeline {
    fn default() -> Self {
        Self::new(Arc::new(QuickJsEvaluator))
    }
}

impl ImagePipeline {
    pub fn new(evaluator: Arc<dyn ScriptEvaluator>) -> Self {
        Self { evaluator }
    }

    /// Fetches a chapter page and its key script, then decodes the image list.
    ///
    /// `headers` go with both requests (the chapter page needs a cookie to serve the
    /// full reader).
    pub async fn fetch_image_urls(
        &self,
        http: &HttpClient,
        chapter_url: &str,
        headers: &[(&str, &str)],
    ) -> Result<Vec<String>> {
        let html = http.get(chapter_url, headers).await?.text();
        let payload = extract_payload(&html, chapter_url)?;
        debug!(script = %payload.script_url, "fetching key script");
        let script = http.get(&payload.script_url, headers).await?.text();
        self.decode(&payload.imgsrcs, &script, &payload.script_url)
    }

    /// The synchronous part of the pipeline, from ciphertext to final page urls.
    pub fn decode(
        &self,
        imgsrcs: &str,
        obfuscated_script: &str,
        script_url: &str,
    ) -> Result<Vec<String>> {
        let ciphertext = base64::engine::general_purpose::STANDARD
            .decode(imgsrcs.trim())
            .map_err(|e| {
                ParserError::decode(script_url, "imgsrcs base64", Some(anyhow::anyhow!(e)))
            })?;

        let script = sojson::decode(obfuscated_script, script_url)?;
        let key = cipher::key_material(&script, "key", script_url)?;
        let iv = cipher::key_material(&script, "iv", script_url)?;
        let plain = cipher::decrypt(&key, &iv, &ciphertext, script_url)?;
        let list = unscramble::unscramble_image_list(&plain, &script);

        let urls: Vec<&str> = list.split(',').map(str::trim).filter(|u| !u.is_empty()).collect();
        let needs_keys = urls.iter().any(|u| u.contains(SCRAMBLED_HOST_MARKER));
        let cols = if needs_keys {
            Some(script::find_cols(&script).ok_or_else(|| {
                ParserError::format(
                    script_url,
                    "descrambling columns",
                    Some(anyhow::anyhow!("var widthnum=heightnum=N; not found")),
                )
            })?)
        } else {
            None
        };

        urls.into_iter()
            .map(|url| match cols {
                Some(cols) if url.contains(SCRAMBLED_HOST_MARKER) => {
                    let key = script::descrambling_key(self.evaluator.as_ref(), &script, url)
                        .inspect_err(|e| warn!(url, error = %e, "descrambling key failed"))?;
                    Ok(format!("{}#desckey={}&cols={}", url, key, cols))
                }
                _ => Ok(url.to_string()),
            })
            .collect()
    }
}

/// Wraps decoded urls into page records.
pub fn to_pages(urls: Vec<String>, source: &str) -> Vec<MangaPage> {
    urls.into_iter().map(|u| MangaPage::new(u, source)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn extracts_payload_and_script_url() {
        let html = r#"<html><head>
            <script src="/js/jquery.js"></script>
            <script src="//static.example.org/r/chapter.js?v=3"></script>
            </head><body><script>
              var imgsrcs = 'QUJD+/==';
              var total = 2;
            </script></body></html>"#;
        let payload = extract_payload(html, "https://www.example.org/read-manga/x/c1/").unwrap();
        assert_eq!(payload.imgsrcs, "QUJD+/==");
        assert_eq!(payload.script_url, "https://static.example.org/r/chapter.js?v=3");
    }

    #[test]
    fn missing_payload_is_not_found() {
        let err = extract_payload("<script>var x = 1;</script>", "https://e/1").unwrap_err();
        assert!(err.is_not_found());
        let err = extract_payload("<script>var imgsrcs = 'QUJD';</script>", "https://e/1")
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(err.op.contains("chapter.js"));
    }

    #[test]
    fn malformed_base64_is_decode_error() {
        let pipeline = ImagePipeline::default();
        let err = pipeline.decode("not base64!!", "['sojson.v4']", "u").unwrap_err();
        assert!(err.is_decode());
    }
}
