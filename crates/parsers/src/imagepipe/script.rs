// ABOUTME: Script evaluation seam and the per-image descrambling key computation.
// ABOUTME: QuickJsEvaluator runs snippets in a fresh rquickjs context; tests inject stubs.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ParserError, Result};

/// Evaluates a JavaScript snippet and returns its completion value as a string.
pub trait ScriptEvaluator: Send + Sync {
    fn evaluate(&self, script: &str) -> Result<String>;
}

/// Evaluator backed by an embedded QuickJS runtime. Each call gets its own context.
#[derive(Debug, Default, Clone, Copy)]
pub struct QuickJsEvaluator;

impl ScriptEvaluator for QuickJsEvaluator {
    fn evaluate(&self, script: &str) -> Result<String> {
        let runtime = rquickjs::Runtime::new()
            .map_err(|e| ParserError::script("quickjs runtime", Some(anyhow::anyhow!("{}", e))))?;
        let context = rquickjs::Context::full(&runtime)
            .map_err(|e| ParserError::script("quickjs context", Some(anyhow::anyhow!("{}", e))))?;
        context.with(|ctx| {
            ctx.eval::<String, _>(script)
                .map_err(|e| ParserError::script("evaluate", Some(anyhow::anyhow!("{}", e))))
        })
    }
}

const RENDER_FN_START: &str = "var renImg = function(img,width,height,id){";
const RENDER_FN_END: &str = "key = key.split(";

/// Lines mentioning any of these touch the DOM or canvas and are dropped.
const DOM_FILTERS: [&str; 7] = [
    "jQuery",
    "document",
    "getContext",
    "toDataURL",
    "getImageData",
    "width",
    "height",
];

/// Helper the render function calls but the page defines elsewhere.
const REPLACE_POS_JS: &str = "function replacePos(strObj, pos, replacetext) {
    var str = strObj.substr(0, pos) + replacetext + strObj.substring(pos + 1, strObj.length);
    return str;
}
";

static COLUMNS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"var\s+widthnum\s*=\s*heightnum\s*=\s*(\d+)\s*;").unwrap());

/// Column count of the descrambling grid, from `var widthnum=heightnum=N;`.
pub fn find_cols(script: &str) -> Option<&str> {
    COLUMNS
        .captures(script)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Builds the snippet computing the descrambling key of `image_url`.
pub fn descrambling_script(script: &str, image_url: &str) -> Option<String> {
    let (_, after) = script.split_once(RENDER_FN_START)?;
    let (body, _) = after.split_once(RENDER_FN_END)?;
    let body = body
        .lines()
        .filter(|line| DOM_FILTERS.iter().all(|f| !line.contains(f)))
        .collect::<Vec<_>>()
        .join("\n")
        .replace("img.src", "url");
    let url_literal = serde_json::to_string(image_url).ok()?;
    Some(format!(
        "{}\nfunction getDescramblingKey(url) {{ {}; return key; }}\ngetDescramblingKey({});",
        REPLACE_POS_JS, body, url_literal
    ))
}

/// Computes the descrambling key of one image through `evaluator`.
pub fn descrambling_key(
    evaluator: &dyn ScriptEvaluator,
    script: &str,
    image_url: &str,
) -> Result<String> {
    let snippet = descrambling_script(script, image_url).ok_or_else(|| {
        ParserError::format(
            image_url,
            "descrambling key",
            Some(anyhow::anyhow!("renImg function not found")),
        )
    })?;
    evaluator.evaluate(&snippet).map_err(|e| e.at(image_url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CHAPTER_JS: &str = r#"var widthnum=heightnum=4;
var renImg = function(img,width,height,id){
var c = document.getElementById(id);
var key = img.src.substring(img.src.length - 10);
key = replacePos(key, 0, "z");
var w = width / widthnum;
key = key.split("");
};"#;

    struct EchoEvaluator;

    impl ScriptEvaluator for EchoEvaluator {
        fn evaluate(&self, script: &str) -> Result<String> {
            Ok(script.to_string())
        }
    }

    #[test]
    fn finds_columns() {
        assert_eq!(find_cols(CHAPTER_JS), Some("4"));
        assert_eq!(find_cols("var widthnum = heightnum = 12 ;"), Some("12"));
        assert_eq!(find_cols("var x = 1;"), None);
    }

    #[test]
    fn builds_filtered_snippet() {
        let snippet = descrambling_script(CHAPTER_JS, "https://cspiclink.example/a.jpg").unwrap();
        assert!(snippet.contains("var key = url.substring(url.length - 10);"));
        assert!(snippet.contains("key = replacePos(key, 0, \"z\");"));
        assert!(!snippet.contains("document"));
        assert!(!snippet.contains("width"));
        assert!(snippet.ends_with("getDescramblingKey(\"https://cspiclink.example/a.jpg\");"));
    }

    #[test]
    fn missing_render_function_is_format_error() {
        let err = descrambling_key(&EchoEvaluator, "var x = 1;", "https://c/1.jpg").unwrap_err();
        assert!(err.is_format());
    }

    #[test]
    fn evaluator_failures_carry_image_url() {
        struct Failing;
        impl ScriptEvaluator for Failing {
            fn evaluate(&self, _: &str) -> Result<String> {
                Err(ParserError::script("evaluate", None))
            }
        }
        let err = descrambling_key(&Failing, CHAPTER_JS, "https://c/1.jpg").unwrap_err();
        assert_eq!(err.url, "https://c/1.jpg");
    }

    #[test]
    fn quickjs_computes_key() {
        let snippet = descrambling_script(CHAPTER_JS, "https://cspiclink.example/abcdefghij.jpg")
            .unwrap();
        let key = QuickJsEvaluator.evaluate(&snippet).unwrap();
        assert_eq!(key, "zfghij.jpg");
    }
}
