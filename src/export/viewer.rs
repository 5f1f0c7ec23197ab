//! Static three.js viewer page

use crate::error::Result;
use std::fs;
use std::path::Path;

const TEMPLATE: &str = include_str!("../../assets/viewer.html");

/// Default page title
pub const DEFAULT_TITLE: &str = "KOI + TESS 3D Explorer";

/// Viewer HTML with the data file names baked in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerPage {
    pub title: String,
    pub points_file: String,
    pub manifest_file: String,
}

impl ViewerPage {
    pub fn new(points_file: impl Into<String>, manifest_file: impl Into<String>) -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            points_file: points_file.into(),
            manifest_file: manifest_file.into(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn render(&self) -> Result<String> {
        // file names land inside <script> as JSON string literals
        let points = serde_json::to_string(&self.points_file)?.replace("</", "<\\/");
        let manifest = serde_json::to_string(&self.manifest_file)?.replace("</", "<\\/");

        Ok(TEMPLATE
            .replace("{{TITLE}}", &escape_html(&self.title))
            .replace("{{POINTS_FILE}}", &points)
            .replace("{{META_FILE}}", &manifest))
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path.as_ref(), self.render()?)?;
        Ok(())
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_bakes_file_names() {
        let html = ViewerPage::new("points_3d.json", "points_3d_meta.json").render().unwrap();
        assert!(html.contains("const POINTS_FILE = \"points_3d.json\";"));
        assert!(html.contains("const META_FILE = \"points_3d_meta.json\";"));
        assert!(html.contains(&format!("<title>{DEFAULT_TITLE}</title>")));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn test_render_references_three_js() {
        let html = ViewerPage::new("p.json", "p_meta.json").render().unwrap();
        assert!(html.contains("three.js/r128/three.min.js"));
        assert!(html.contains("OrbitControls.js"));
        assert!(html.contains("cache: \"no-cache\""));
    }

    #[test]
    fn test_title_is_escaped() {
        let html = ViewerPage::new("p.json", "p_meta.json")
            .with_title("<b>KOI & TESS</b>")
            .render()
            .unwrap();
        assert!(html.contains("&lt;b&gt;KOI &amp; TESS&lt;/b&gt;"));
        assert!(!html.contains("<b>KOI"));
    }

    #[test]
    fn test_catalog_text_is_escaped_before_markup() {
        let html = ViewerPage::new("p.json", "p_meta.json").render().unwrap();
        assert!(html.contains("function escapeHtml(v)"));
        assert_eq!(html.matches(".innerHTML =").count(), 3);
        for inserted in [
            "escapeHtml(name)",
            "escapeHtml(meta.projector)",
            "escapeHtml(meta.clustering)",
            "escapeHtml(displayName(p))",
            "escapeHtml(p.source)",
            "escapeHtml(p.kepid || \"-\")",
            "escapeHtml(p.toi || \"-\")",
        ] {
            assert!(html.contains(inserted), "{inserted} not escaped");
        }
        assert!(!html.contains("+ displayName(p) +"));
    }

    #[test]
    fn test_file_names_cannot_close_script() {
        let html = ViewerPage::new("a</script>.json", "m.json").render().unwrap();
        assert!(html.contains("\"a<\\/script>.json\""));
    }
}
