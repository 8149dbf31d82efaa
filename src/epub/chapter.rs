use std::path::Path;

use anyhow::Result;
use scraper::{ElementRef, Html, Node};
use tokio::fs;
use tracing::{debug, instrument};

use crate::epub::metadata::escape;
use crate::novel::ChapterRecord;

static XML_CONTENT_1: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.1//EN" "http://www.w3.org/TR/xhtml11/DTD/xhtml11.dtd">
<html xmlns="http://www.w3.org/1999/xhtml">
<head>
    <title>"#;

static XML_CONTENT_2: &str = r#"</title>
    <meta http-equiv="Content-Type" content="text/html; charset=UTF-8"/>
</head>
<body>
    <div class="chapter-content">
"#;

static XML_CONTENT_3: &str = r#"
    </div>
</body>
</html>"#;

static VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// 把HTML片段重新序列化为XHTML：文本转义，空元素自闭合
pub fn to_xhtml(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut xhtml = String::with_capacity(html.len());
    write_children(fragment.root_element(), &mut xhtml);
    xhtml
}

fn write_children(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(&escape(text)),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    write_element(child, out);
                }
            }
            _ => {}
        }
    }
}

fn write_element(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name();
    out.push('<');
    out.push_str(name);
    for (attr, value) in element.value().attrs() {
        out.push_str(&format!(r#" {}="{}""#, attr, escape(value)));
    }
    if VOID_ELEMENTS.contains(&name) {
        out.push_str("/>");
        return;
    }
    out.push('>');
    write_children(element, out);
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

/// 书内的一章，`index` 是在本书中的顺序
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub index: usize,
    pub title: String,
    pub filename: String,
}

impl Chapter {
    pub fn new(index: usize, record: &ChapterRecord) -> Self {
        Self {
            index,
            title: record.chapter_title.clone(),
            filename: format!("{:0>5}.xhtml", record.chapter_no),
        }
    }

    /// 正文已经带有 `<h1>` 标题，写入前转成合法的XHTML
    pub fn xhtml(&self, body: &str) -> String {
        let mut xhtml_content = String::new();
        xhtml_content.push_str(XML_CONTENT_1);
        xhtml_content.push_str(&escape(&self.title));
        xhtml_content.push_str(XML_CONTENT_2);
        xhtml_content.push_str(&to_xhtml(body));
        xhtml_content.push_str(XML_CONTENT_3);
        xhtml_content
    }

    #[instrument(skip_all, fields(chapter = %self.filename))]
    pub async fn write(&self, text_dir: &Path, body: &str) -> Result<()> {
        let xhtml_path = text_dir.join(&self.filename);
        fs::write(&xhtml_path, self.xhtml(body)).await?;
        debug!("章节 XHTML 已保存到: {}", xhtml_path.display());
        Ok(())
    }
}
