// ABOUTME: End-to-end tests for the obfuscated image pipeline with fixed ciphertext and key script.
// ABOUTME: Covers the synchronous decode path and the Mangago chapter flow against an httpmock server.

use std::sync::Arc;

use httpmock::prelude::*;
use pretty_assertions::assert_eq;
use tankobon_parsers::imagepipe::{self, ImagePipeline, ScriptEvaluator};
use tankobon_parsers::model::generate_uid;
use tankobon_parsers::{Mangago, MangaChapter, MangaParser, ParserError, SourceConfigBuilder};

/// AES-128-CBC (PKCS7) of the scrambled list, key and iv as in `KEY_SCRIPT`.
const IMGSRCS: &str = "mc6CqNqgEVqLQ9y4HCkllhQDazJbsX/CwLdkTMX5QYDdYd6MWJ5C6HMHdZMUm5NLGH/XVDv+oAFKHFKNR/PFr5MPPxVi2vusNJk7XoTHep4=";

const KEY_SCRIPT: &str = r#"var key = CryptoJS.enc.Hex.parse("e11adc3949ba59abbe56e057f20f883e");
var iv = CryptoJS.enc.Hex.parse("1234567890abcdef1234567890abcdef");
var code = str.charAt(4) + str.charAt(9);
var widthnum=heightnum=4;
var renImg = function(img,width,height,id){
var c = document.getElementById(id);
var key = img.src.substring(img.src.length - 8);
key = key.split("");
};"#;

const PLAIN_URL: &str = "https://i.mangago.example/a/001.jpg";
const SCRAMBLED_URL: &str = "https://iweb.cspiclink.example/b/002.jpg";

/// Builds a sojson.v4 envelope around `script`.
fn obfuscate(script: &str) -> String {
    let mut out = String::from("['sojson.v4']");
    while out.len() < 240 {
        out.push('x');
    }
    let codes: Vec<String> = script.chars().map(|c| (c as u32).to_string()).collect();
    out.push_str(&codes.join("Ab"));
    out.push_str(&"z".repeat(59));
    out
}

struct FixedKeyEvaluator;

impl ScriptEvaluator for FixedKeyEvaluator {
    fn evaluate(&self, script: &str) -> Result<String, ParserError> {
        assert!(script.contains("getDescramblingKey(\"https://iweb.cspiclink.example/b/002.jpg\")"));
        assert!(!script.contains("document"));
        Ok("k3y".to_string())
    }
}

fn pipeline() -> ImagePipeline {
    ImagePipeline::new(Arc::new(FixedKeyEvaluator))
}

#[test]
fn decodes_fixed_fixture_to_url_list() {
    let urls = pipeline()
        .decode(IMGSRCS, &obfuscate(KEY_SCRIPT), "https://s.example/chapter.js")
        .unwrap();
    assert_eq!(
        urls,
        vec![
            PLAIN_URL.to_string(),
            format!("{}#desckey=k3y&cols=4", SCRAMBLED_URL),
        ]
    );
}

#[test]
fn wrong_envelope_is_format_error() {
    let err = pipeline()
        .decode(IMGSRCS, KEY_SCRIPT, "https://s.example/chapter.js")
        .unwrap_err();
    assert!(err.is_format());
}

#[test]
fn scrambled_host_without_columns_is_format_error() {
    let script = KEY_SCRIPT.replace("var widthnum=heightnum=4;", "");
    let err = pipeline()
        .decode(IMGSRCS, &obfuscate(&script), "https://s.example/chapter.js")
        .unwrap_err();
    assert!(err.is_format());
}

#[test]
fn wrong_key_is_decode_error() {
    let script = KEY_SCRIPT.replace("e11adc3949ba59abbe56e057f20f883e", "00112233445566778899aabbccddeeff");
    let err = pipeline()
        .decode(IMGSRCS, &obfuscate(&script), "https://s.example/chapter.js")
        .unwrap_err();
    assert!(err.is_decode());
}

#[tokio::test]
async fn mangago_pages_run_the_pipeline() {
    let server = MockServer::start_async().await;
    let page = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/read-manga/sample/mf/v01/c001/")
                .header("Cookie", "_m_superu=1");
            then.status(200).body(format!(
                r#"<html><head><script src="/r/chapter.js?v=2"></script></head>
                   <body><script>var imgsrcs = '{}';</script></body></html>"#,
                IMGSRCS
            ));
        })
        .await;
    let script = server
        .mock_async(|when, then| {
            when.method(GET).path("/r/chapter.js");
            then.status(200).body(obfuscate(KEY_SCRIPT));
        })
        .await;

    let config = SourceConfigBuilder::new(server.address().to_string())
        .scheme("http")
        .build();
    let parser = Mangago::new(config).unwrap().with_pipeline(pipeline());
    let url = "/read-manga/sample/mf/v01/c001/";
    let chapter = MangaChapter {
        id: generate_uid(Mangago::NAME, url),
        title: Some("Ch.001".into()),
        number: 1.0,
        volume: 0,
        url: url.into(),
        scanlator: None,
        upload_date: 0,
        branch: None,
        source: Mangago::NAME.into(),
    };

    let pages = parser.pages(&chapter).await.unwrap();
    page.assert_async().await;
    script.assert_async().await;

    let urls: Vec<_> = pages.iter().map(|p| p.url.clone()).collect();
    assert_eq!(
        urls,
        vec![
            PLAIN_URL.to_string(),
            format!("{}#desckey=k3y&cols=4", SCRAMBLED_URL),
        ]
    );
    assert_eq!(pages, imagepipe::to_pages(urls, Mangago::NAME));
}

#[tokio::test]
async fn missing_payload_fails_the_chapter() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/read-manga/sample/mf/v01/c002/");
            then.status(200).body("<html><body>maintenance</body></html>");
        })
        .await;
    let config = SourceConfigBuilder::new(server.address().to_string())
        .scheme("http")
        .build();
    let parser = Mangago::new(config).unwrap().with_pipeline(pipeline());
    let url = "/read-manga/sample/mf/v01/c002/";
    let chapter = MangaChapter {
        id: generate_uid(Mangago::NAME, url),
        title: None,
        number: 2.0,
        volume: 0,
        url: url.into(),
        scanlator: None,
        upload_date: 0,
        branch: None,
        source: Mangago::NAME.into(),
    };
    let err = parser.pages(&chapter).await.unwrap_err();
    assert!(err.is_not_found());
}
