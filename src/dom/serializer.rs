use encoding_rs::Encoding;
use html5ever::serialize::{serialize, SerializeOpts, TraversalScope};
use markup5ever_rcdom::{Handle, SerializableHandle};

use crate::error::{EngineError, EngineResult};

/// 序列化整个文档，按 `document_encoding` 重新编码
pub fn serialize_document(document: &Handle, document_encoding: &str) -> EngineResult<Vec<u8>> {
    let mut buf: Vec<u8> = Vec::new();
    let serializable: SerializableHandle = document.clone().into();
    serialize(&mut buf, &serializable, SerializeOpts::default())
        .map_err(|e| EngineError::Serialization(format!("cannot serialize DOM: {}", e)))?;

    if !document_encoding.is_empty() {
        if let Some(encoding) = Encoding::for_label(document_encoding.as_bytes()) {
            if encoding != encoding_rs::UTF_8 {
                let s: &str = &String::from_utf8_lossy(&buf);
                let (data, _, _) = encoding.encode(s);
                buf = data.to_vec();
            }
        }
    }

    Ok(buf)
}

/// 元素的 innerHTML
pub fn inner_html(node: &Handle) -> EngineResult<String> {
    let mut buf: Vec<u8> = Vec::new();
    let serializable: SerializableHandle = node.clone().into();
    let opts = SerializeOpts {
        traversal_scope: TraversalScope::ChildrenOnly(None),
        ..Default::default()
    };
    serialize(&mut buf, &serializable, opts)
        .map_err(|e| EngineError::Serialization(format!("cannot serialize element: {}", e)))?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
