use anyhow::Result;
use tokio::fs;
use tracing::{info, instrument};

use crate::epub::chapter::Chapter;

use super::Epub;

pub struct Metadata;

impl Default for Metadata {
    fn default() -> Self {
        Self::new()
    }
}

/// 转义XML文本中的特殊字符
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

impl Metadata {
    pub fn new() -> Self {
        Self
    }

    /// 生成mimetype文件
    pub async fn mimetype(&self, epub: &Epub) -> Result<()> {
        fs::write(epub.epub_dir.join("mimetype"), "application/epub+zip").await?;
        Ok(())
    }

    /// 生成container.xml文件
    pub async fn container_xml(&self, epub: &Epub) -> Result<()> {
        let container_content = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
    <rootfiles>
        <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
    </rootfiles>
</container>"#;
        fs::write(epub.meta_dir.join("container.xml"), container_content).await?;
        Ok(())
    }

    /// 生成content.opf文件
    pub async fn content_opf(&self, epub: &Epub) -> Result<()> {
        fs::write(epub.oebps_dir.join("content.opf"), Self::opf(epub)).await?;
        Ok(())
    }

    /// 生成toc.ncx文件
    pub async fn toc_ncx(&self, epub: &Epub) -> Result<()> {
        fs::write(epub.oebps_dir.join("toc.ncx"), Self::ncx(epub)).await?;
        Ok(())
    }

    /// 生成所有元数据文件
    #[instrument(skip_all)]
    pub async fn generate(&self, epub: &Epub) -> Result<()> {
        info!("正在生成EPUB元数据文件");
        self.mimetype(epub).await?;
        self.container_xml(epub).await?;
        self.content_opf(epub).await?;
        self.toc_ncx(epub).await?;
        info!("EPUB元数据文件已生成");
        Ok(())
    }
}

impl Metadata {
    pub fn opf(epub: &Epub) -> String {
        let mut content_opf = String::new();
        content_opf.push_str(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<package version="2.0" xmlns="http://www.idpf.org/2007/opf" unique-identifier="BookId">"#,
        );
        Self::opf_metadata(&mut content_opf, epub);
        Self::opf_manifest(&mut content_opf, epub);
        Self::opf_spine(&mut content_opf, &epub.chapters);
        Self::opf_guide(&mut content_opf, epub);
        content_opf.push_str(
            r#"
</package>"#,
        );
        content_opf
    }

    fn opf_metadata(content_opf: &mut String, epub: &Epub) {
        content_opf.push_str(&format!(
            r#"
    <metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
        <dc:identifier id="BookId">{}</dc:identifier>
        <dc:title>{}</dc:title>
        <dc:language>{}</dc:language>
        <dc:creator opf:role="aut">{}</dc:creator>
        <dc:publisher>wuxia-fetch</dc:publisher>
        <dc:date>{}</dc:date>"#,
            escape(&epub.id),
            escape(&epub.title),
            escape(&epub.lang),
            escape(&epub.author),
            chrono::Local::now().format("%Y-%m-%d"),
        ));
        if epub.cover.is_some() {
            content_opf.push_str(
                r#"
        <meta name="cover" content="cover-image"/>"#,
            );
        }
        content_opf.push_str(
            r#"
        <meta name="generator" content="wuxia-fetch"/>
    </metadata>"#,
        );
    }

    fn opf_manifest(content_opf: &mut String, epub: &Epub) {
        content_opf.push_str(
            r#"
    <manifest>
        <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>"#,
        );

        if let Some(cover_name) = &epub.cover {
            content_opf.push_str(&format!(
                r#"
        <item id="cover-image" href="images/{}" media-type="{}"/>"#,
                cover_name,
                Self::get_media_type(cover_name)
            ));
        }

        for chapter in &epub.chapters {
            content_opf.push_str(&format!(
                r#"
        <item id="chap{}" href="text/{}" media-type="application/xhtml+xml"/>"#,
                chapter.index, chapter.filename
            ));
        }
        content_opf.push_str(
            r#"
    </manifest>"#,
        );
    }

    fn opf_spine(content_opf: &mut String, chapters: &[Chapter]) {
        content_opf.push_str(
            r#"
    <spine toc="ncx">"#,
        );
        for chapter in chapters {
            content_opf.push_str(&format!(
                r#"
        <itemref idref="chap{}"/>"#,
                chapter.index
            ));
        }
        content_opf.push_str(
            r#"
    </spine>"#,
        );
    }

    fn opf_guide(content_opf: &mut String, epub: &Epub) {
        let Some(cover_name) = &epub.cover else {
            return;
        };
        content_opf.push_str(&format!(
            r#"
    <guide>
        <reference type="cover" title="Cover" href="images/{}"/>
    </guide>"#,
            cover_name
        ));
    }

    pub fn ncx(epub: &Epub) -> String {
        let mut toc_ncx = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx version="2005-1" xmlns="http://www.daisy.org/z3986/2005/ncx/">
    <head>
        <meta name="dtb:uid" content="{}"/>
        <meta name="dtb:depth" content="1"/>
        <meta name="dtb:totalPageCount" content="0"/>
        <meta name="dtb:maxPageNumber" content="0"/>
    </head>
    <docTitle>
        <text>{}</text>
    </docTitle>
    <navMap>"#,
            escape(&epub.id),
            escape(&epub.title)
        );

        for chapter in &epub.chapters {
            toc_ncx.push_str(&format!(
                r#"
        <navPoint id="navPoint{}" playOrder="{}">
            <navLabel>
                <text>{}</text>
            </navLabel>
            <content src="text/{}"/>
        </navPoint>"#,
                chapter.index,
                chapter.index,
                escape(&chapter.title),
                chapter.filename
            ));
        }

        toc_ncx.push_str(
            r#"
    </navMap>
</ncx>"#,
        );
        toc_ncx
    }

    fn get_media_type(filename: &str) -> &str {
        if filename.ends_with(".png") {
            "image/png"
        } else if filename.ends_with(".jpg") || filename.ends_with(".jpeg") {
            "image/jpeg"
        } else if filename.ends_with(".gif") {
            "image/gif"
        } else if filename.ends_with(".webp") {
            "image/webp"
        } else {
            "application/octet-stream"
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn epub(cover: Option<&str>) -> Epub {
        Epub {
            id: "mga".to_owned(),
            title: "Gods & Demons".to_owned(),
            lang: "en".to_owned(),
            author: "Bee".to_owned(),
            cover: cover.map(str::to_owned),
            chapters: vec![
                Chapter {
                    index: 1,
                    title: "Chapter 2".to_owned(),
                    filename: "00002.xhtml".to_owned(),
                },
                Chapter {
                    index: 2,
                    title: "Chapter <3>".to_owned(),
                    filename: "00003.xhtml".to_owned(),
                },
            ],
            epub_dir: PathBuf::new(),
            meta_dir: PathBuf::new(),
            oebps_dir: PathBuf::new(),
            image_dir: PathBuf::new(),
            text_dir: PathBuf::new(),
        }
    }

    #[test]
    fn escape_replaces_markup_characters() {
        assert_eq!(escape(r#"a & <b> "c" 'd'"#), "a &amp; &lt;b&gt; &quot;c&quot; &apos;d&apos;");
    }

    #[test]
    fn opf_lists_chapters_in_spine_order() {
        let opf = Metadata::opf(&epub(None));
        assert!(opf.contains("<dc:title>Gods &amp; Demons</dc:title>"));
        assert!(opf.contains(r#"<item id="chap2" href="text/00003.xhtml""#));
        let first = opf.find(r#"<itemref idref="chap1"/>"#).unwrap();
        let second = opf.find(r#"<itemref idref="chap2"/>"#).unwrap();
        assert!(first < second);
        assert!(!opf.contains("<guide>"));
    }

    #[test]
    fn opf_references_cover_when_present() {
        let opf = Metadata::opf(&epub(Some("abc.png")));
        assert!(opf.contains(r#"<item id="cover-image" href="images/abc.png" media-type="image/png"/>"#));
        assert!(opf.contains(r#"<reference type="cover" title="Cover" href="images/abc.png"/>"#));
    }

    #[test]
    fn ncx_has_a_nav_point_per_chapter() {
        let ncx = Metadata::ncx(&epub(None));
        assert_eq!(ncx.matches("<navPoint ").count(), 2);
        assert!(ncx.contains("<text>Chapter &lt;3&gt;</text>"));
    }
}
