// src/blockchain/services/metadata.rs

//! Off-chain storage for NFT collection artwork and metadata.
//!
//! Only the interface matters to the orchestrator. The bundled implementation
//! keeps nothing and hands back content-addressed `ipfs://` style URIs, so the
//! same input always maps to the same URI.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

#[async_trait]
pub trait MetadataHost: Send + Sync {
    /// Stores image bytes and returns a URI for them.
    async fn upload_image(&self, file_name: &str, bytes: &[u8]) -> Result<String>;

    /// Stores a metadata document and returns a base URI for it.
    async fn upload_metadata(&self, metadata: &Value) -> Result<String>;
}

#[derive(Debug, Clone, Default)]
pub struct SimulatedMetadataHost;

fn content_uri(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    format!("ipfs://sim-{}", hex::encode(digest))
}

#[async_trait]
impl MetadataHost for SimulatedMetadataHost {
    async fn upload_image(&self, file_name: &str, bytes: &[u8]) -> Result<String> {
        if bytes.is_empty() {
            bail!("refusing to upload empty image {}", file_name);
        }
        tracing::debug!("Simulated upload of {} ({} bytes)", file_name, bytes.len());
        Ok(format!("{}/{}", content_uri(bytes), file_name))
    }

    async fn upload_metadata(&self, metadata: &Value) -> Result<String> {
        let bytes = serde_json::to_vec(metadata)?;
        Ok(format!("{}/", content_uri(&bytes)))
    }
}

/// Placeholder collection artwork: an SVG tile with a colour derived from the name.
pub fn render_placeholder_image(name: &str, symbol: &str) -> Vec<u8> {
    let digest = Sha256::digest(name.as_bytes());
    let colour = hex::encode(&digest[..3]);
    let symbol = escape_xml(symbol);
    format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="512" height="512"><rect width="512" height="512" fill="#{colour}"/><text x="50%" y="50%" font-size="64" text-anchor="middle" fill="#ffffff">{symbol}</text></svg>"##
    )
    .into_bytes()
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// Collection-level metadata in the OpenSea contract-metadata shape.
pub fn collection_metadata(name: &str, symbol: &str, description: &str, image_uri: &str) -> Value {
    json!({
        "name": name,
        "symbol": symbol,
        "description": description,
        "image": image_uri,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn uploads_are_content_addressed() {
        let host = SimulatedMetadataHost;
        let a = host.upload_image("a.svg", b"same").await.unwrap();
        let b = host.upload_image("a.svg", b"same").await.unwrap();
        let c = host.upload_image("a.svg", b"other").await.unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("ipfs://sim-"));
        assert!(host.upload_image("x.svg", b"").await.is_err());
    }

    #[tokio::test]
    async fn metadata_uri_is_a_base_uri() {
        let doc = collection_metadata("Chogs", "CHG", "desc", "ipfs://img");
        let uri = SimulatedMetadataHost.upload_metadata(&doc).await.unwrap();
        assert!(uri.ends_with('/'));
    }

    #[test]
    fn placeholder_image_is_svg_with_symbol() {
        let svg = String::from_utf8(render_placeholder_image("Chogs", "CHG")).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("CHG"));
    }

    #[test]
    fn placeholder_image_escapes_markup_in_the_symbol() {
        let svg = String::from_utf8(render_placeholder_image("x", "<script>&\"'")).unwrap();
        assert!(!svg.contains("<script>"));
        assert!(svg.contains(">&lt;script&gt;&amp;&quot;&apos;</text>"));
    }
}
