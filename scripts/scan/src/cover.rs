//! Cover images: a resized remote cover when one can be fetched, otherwise a
//! generated placeholder card. Both end up as `{id}.jpg` in the cover directory.

use anyhow::{anyhow, bail, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, RgbaImage};
use log::{debug, warn};
use resvg::{tiny_skia, usvg};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{
    COVER_HEIGHT, COVER_JPEG_QUALITY, COVER_WIDTH, PLACEHOLDER_CHARS_PER_LINE,
    PLACEHOLDER_MAX_LINES,
};
use crate::model::{FileType, UNKNOWN_AUTHOR};
use crate::provider::HttpFetch;
use crate::store::write_bytes_atomic;

pub struct CoverResolver {
    fetch: Arc<dyn HttpFetch>,
    dir: PathBuf,
    prefix: String,
    svg_options: usvg::Options<'static>,
}

impl CoverResolver {
    pub fn new(fetch: Arc<dyn HttpFetch>, dir: &Path, prefix: &str) -> Self {
        let mut svg_options = usvg::Options::default();
        svg_options.fontdb_mut().load_system_fonts();
        Self {
            fetch,
            dir: dir.to_path_buf(),
            prefix: prefix.trim_end_matches('/').to_string(),
            svg_options,
        }
    }

    /// Public path of the stored cover, or `None` when not even a placeholder could be made.
    pub async fn resolve(
        &self,
        id: &str,
        remote_url: Option<&str>,
        title: &str,
        author: &str,
        file_type: FileType,
    ) -> Option<String> {
        if let Some(url) = remote_url {
            match self.download(id, url).await {
                Ok(()) => return Some(self.public_path(id)),
                Err(e) => warn!("cover download failed for {:?}, using placeholder: {e:#}", title),
            }
        }
        match self.placeholder(id, title, author, file_type) {
            Ok(()) => Some(self.public_path(id)),
            Err(e) => {
                warn!("placeholder cover failed for {:?}: {e:#}", title);
                None
            }
        }
    }

    fn target(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.jpg"))
    }

    fn public_path(&self, id: &str) -> String {
        format!("{}/{id}.jpg", self.prefix)
    }

    async fn download(&self, id: &str, url: &str) -> Result<()> {
        debug!("downloading cover {url}");
        let bytes = self.fetch.get_bytes(url).await?;
        if !infer::is_image(&bytes) {
            bail!("{url} did not return an image");
        }
        let decoded = image::load_from_memory(&bytes).with_context(|| format!("decode {url}"))?;
        let fitted = decoded.resize_to_fill(COVER_WIDTH, COVER_HEIGHT, FilterType::Lanczos3);
        write_bytes_atomic(&self.target(id), &encode_jpeg(&fitted)?)
    }

    fn placeholder(&self, id: &str, title: &str, author: &str, file_type: FileType) -> Result<()> {
        let svg = placeholder_svg(title, author, file_type);
        let tree = usvg::Tree::from_str(&svg, &self.svg_options).context("parse placeholder SVG")?;
        let mut pixmap = tiny_skia::Pixmap::new(COVER_WIDTH, COVER_HEIGHT)
            .ok_or_else(|| anyhow!("allocate {COVER_WIDTH}x{COVER_HEIGHT} pixmap"))?;
        resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());
        let rgba = RgbaImage::from_raw(COVER_WIDTH, COVER_HEIGHT, pixmap.take())
            .ok_or_else(|| anyhow!("pixmap size mismatch"))?;
        write_bytes_atomic(&self.target(id), &encode_jpeg(&DynamicImage::ImageRgba8(rgba))?)
    }
}

fn encode_jpeg(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut encoded = Vec::new();
    JpegEncoder::new_with_quality(&mut encoded, COVER_JPEG_QUALITY)
        .encode_image(&image.to_rgb8())
        .context("encode JPEG")?;
    Ok(encoded)
}

/// Greedy word wrap: at most `PLACEHOLDER_MAX_LINES` lines of roughly
/// `PLACEHOLDER_CHARS_PER_LINE` characters. A single long word keeps its own line.
pub fn wrap_title(title: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in title.split_whitespace() {
        let fits = current.chars().count() + word.chars().count() <= PLACEHOLDER_CHARS_PER_LINE;
        if current.is_empty() || fits {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines.truncate(PLACEHOLDER_MAX_LINES);
    lines
}

fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn placeholder_svg(title: &str, author: &str, file_type: FileType) -> String {
    let tspans: String = wrap_title(title)
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let dy = if i == 0 { 0 } else { 40 };
            format!(r#"<tspan x="250" dy="{dy}">{}</tspan>"#, xml_escape(line))
        })
        .collect();
    let author = if author == UNKNOWN_AUTHOR { "" } else { author };
    format!(
        concat!(
            r#"<svg width="{w}" height="{h}" viewBox="0 0 {w} {h}" xmlns="http://www.w3.org/2000/svg">"#,
            r##"<rect width="{w}" height="{h}" fill="#2a2a2a"/>"##,
            r##"<rect width="480" height="730" x="10" y="10" fill="#3a3a3a" rx="5" ry="5"/>"##,
            r#"<text x="250" y="375" font-family="Arial, sans-serif" font-size="32" fill="white" text-anchor="middle">{tspans}</text>"#,
            r##"<text x="250" y="500" font-family="Arial, sans-serif" font-size="24" fill="#cccccc" text-anchor="middle">{author}</text>"##,
            r##"<text x="250" y="700" font-family="Arial, sans-serif" font-size="18" fill="#999999" text-anchor="middle">{kind}</text>"##,
            "</svg>"
        ),
        w = COVER_WIDTH,
        h = COVER_HEIGHT,
        tspans = tspans,
        author = xml_escape(author),
        kind = file_type.as_str().to_uppercase(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::testing::MockFetch;
    use image::{GenericImageView, Rgb, RgbImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 40, 40])));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn wrap_respects_width_and_line_limit() {
        assert_eq!(wrap_title("Le Trône de Fer"), vec!["Le Trône de Fer"]);
        assert_eq!(
            wrap_title("La Horde du Contrevent et autres récits"),
            vec!["La Horde du", "Contrevent et autres", "récits"]
        );
        let long = "un deux trois quatre cinq six sept huit neuf dix onze douze treize quatorze quinze seize";
        assert_eq!(wrap_title(long).len(), PLACEHOLDER_MAX_LINES);
        assert_eq!(wrap_title("Anticonstitutionnellement!"), vec!["Anticonstitutionnellement!"]);
    }

    #[test]
    fn svg_escapes_text_and_hides_unknown_author() {
        let svg = placeholder_svg("Tom & Jerry <3", UNKNOWN_AUTHOR, FileType::Cbz);
        assert!(svg.contains("Tom &amp; Jerry &lt;3"));
        assert!(!svg.contains(UNKNOWN_AUTHOR));
        assert!(svg.contains(">CBZ</text>"));

        let svg = placeholder_svg("Dune", "Frank \"Bene\" Herbert", FileType::Epub);
        assert!(svg.contains("Frank &quot;Bene&quot; Herbert"));
    }

    #[tokio::test]
    async fn remote_cover_is_resized_to_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let url = "https://covers.example/1.png";
        let fetch = Arc::new(MockFetch::new().image(url, png_bytes(100, 100)));
        let resolver = CoverResolver::new(fetch.clone(), dir.path(), "/data/covers/");

        let path = resolver.resolve("abc", Some(url), "Dune", "Frank Herbert", FileType::Epub).await;
        assert_eq!(path.as_deref(), Some("/data/covers/abc.jpg"));
        assert_eq!(fetch.byte_calls(), 1);

        let stored = image::open(dir.path().join("abc.jpg")).unwrap();
        assert_eq!(stored.dimensions(), (COVER_WIDTH, COVER_HEIGHT));
    }

    #[tokio::test]
    async fn non_image_download_falls_back_to_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let url = "https://covers.example/broken";
        let fetch = Arc::new(MockFetch::new().image(url, b"<html>not found</html>".to_vec()));
        let resolver = CoverResolver::new(fetch, dir.path(), "/data/covers");

        let path = resolver.resolve("p1", Some(url), "Dune", UNKNOWN_AUTHOR, FileType::Pdf).await;
        assert_eq!(path.as_deref(), Some("/data/covers/p1.jpg"));
        let bytes = std::fs::read(dir.path().join("p1.jpg")).unwrap();
        assert_eq!(infer::get(&bytes).map(|t| t.mime_type()), Some("image/jpeg"));
    }

    #[tokio::test]
    async fn unwritable_cover_dir_yields_null() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("covers");
        std::fs::write(&blocker, b"a file, not a directory").unwrap();
        let resolver = CoverResolver::new(Arc::new(MockFetch::new()), &blocker, "/data/covers");

        assert_eq!(resolver.resolve("x", None, "Dune", "Frank Herbert", FileType::Epub).await, None);
    }
}
