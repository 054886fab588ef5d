use rasheed_ai::{
    agent::{Agent, ToolRegistry},
    config::{AgentConfig, Config, LlmConfig},
    llm::LlmClient,
    vision::ClassLabels,
};
use std::io::Cursor;
use std::sync::Arc;

/// Create a test configuration with sensible defaults
pub fn create_test_config() -> Config {
    let mut config = Config::default();
    config.llm = LlmConfig {
        api_key: "test-api-key".to_string(),
        model: "gpt-4o-mini".to_string(),
        ..LlmConfig::default()
    };
    config.server.logs.level = "debug".to_string();
    config
}

pub fn create_test_agent(client: Arc<dyn LlmClient>) -> Agent {
    let config = create_test_config();
    Agent::new(
        client,
        ToolRegistry::with_defaults(),
        &config.llm,
        &AgentConfig::default(),
    )
}

pub fn test_labels(n: usize) -> ClassLabels {
    ClassLabels::new((0..n).map(|i| format!("class {i}")).collect())
}

pub fn png_bytes(width: u32, height: u32, pixel: [u8; 3]) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb(pixel));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// Builds a PDF with one Helvetica text line per page.
pub fn make_test_pdf(pages: &[&str]) -> Vec<u8> {
    use lopdf::dictionary;
    use lopdf::{Document, Object, Stream};

    let mut doc = Document::with_version("1.4");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => Object::Name(b"Font".to_vec()),
        "Subtype" => Object::Name(b"Type1".to_vec()),
        "BaseFont" => Object::Name(b"Helvetica".to_vec()),
    });

    let kids: Vec<Object> = pages
        .iter()
        .map(|text| {
            let content = format!("BT /F1 12 Tf 100 700 Td ({text}) Tj ET");
            let content_id = doc.add_object(Object::Stream(Stream::new(dictionary! {}, content.into_bytes())));
            Object::Reference(doc.add_object(dictionary! {
                "Type" => Object::Name(b"Page".to_vec()),
                "Parent" => Object::Reference(pages_id),
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => Object::Reference(content_id),
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F1" => Object::Reference(font_id) },
                },
            }))
        })
        .collect();

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => Object::Name(b"Pages".to_vec()),
            "Kids" => kids,
            "Count" => Object::Integer(count),
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => Object::Name(b"Catalog".to_vec()),
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

pub const BOUNDARY: &str = "rasheed-test-boundary";

/// A form part: `(name, file_name, content_type, bytes)`.
pub type Part<'a> = (&'a str, Option<&'a str>, Option<&'a str>, &'a [u8]);

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, file_name, content_type, bytes) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        let disposition = match file_name {
            Some(file_name) => {
                format!("Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n")
            }
            None => format!("Content-Disposition: form-data; name=\"{name}\"\r\n"),
        };
        body.extend_from_slice(disposition.as_bytes());
        if let Some(content_type) = content_type {
            body.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}
