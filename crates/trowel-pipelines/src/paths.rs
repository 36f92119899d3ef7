//! The path table: where each asset category reads from and writes to.
//!
//! All paths are relative to the project root. Every field has a default so a
//! `[paths]` section only needs to list what it overrides.

use serde::Deserialize;

/// Source patterns and destinations for every asset category.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PathTable {
    /// Raster and SVG image sources
    pub images_src: String,
    /// Processed images
    pub images_dest: String,

    /// Fonts converted to WOFF
    pub fonts_src: String,
    /// Fonts converted to WOFF2
    pub fonts_woff2_src: String,
    /// Emitted web fonts
    pub fonts_dest: String,

    /// Script entries, concatenated in order
    pub scripts_src: Vec<String>,
    /// Minified script bundle
    pub scripts_bundle: String,

    /// Stylesheet entries, concatenated in order
    pub styles_src: Vec<String>,
    /// Everything that should retrigger the styles pipeline
    pub styles_watch: String,
    /// Compressed stylesheet bundle
    pub styles_bundle: String,

    /// HTML pages with include directives
    pub pages_src: String,
    /// Directory that `@@name` directives resolve against
    pub components_dir: String,
    /// Where expanded pages are written
    pub pages_dest: String,

    /// Working build directory served in development
    pub serve_root: String,
    /// Distribution directory assembled by the release bundle
    pub dist_dir: String,
    /// Artifacts copied into the distribution, relative to `serve_root`
    pub release: Vec<String>,
}

impl PathTable {
    /// Glob matching every component file, used to retrigger pages.
    pub fn components_watch(&self) -> String {
        format!("{}/**/*.html", self.components_dir.trim_end_matches('/'))
    }
}

impl Default for PathTable {
    fn default() -> Self {
        Self {
            images_src: "app/images/src/**/*.{jpg,jpeg,png,svg}".to_string(),
            images_dest: "app/images".to_string(),
            fonts_src: "app/fonts/src/*.{ttf,otf}".to_string(),
            fonts_woff2_src: "app/fonts/src/*.ttf".to_string(),
            fonts_dest: "app/fonts".to_string(),
            scripts_src: vec!["app/js/main.js".to_string()],
            scripts_bundle: "app/js/main.min.js".to_string(),
            styles_src: vec!["app/scss/style.scss".to_string()],
            styles_watch: "app/scss/**/*.scss".to_string(),
            styles_bundle: "app/css/style.min.css".to_string(),
            pages_src: "app/pages/*.html".to_string(),
            components_dir: "app/components".to_string(),
            pages_dest: "app".to_string(),
            serve_root: "app".to_string(),
            dist_dir: "dist".to_string(),
            release: vec![
                "css/style.min.css".to_string(),
                "css/style.min.css.map".to_string(),
                "images/**/*.{svg,webp,avif}".to_string(),
                "fonts/*.{woff,woff2}".to_string(),
                "js/main.min.js".to_string(),
                "js/main.min.js.map".to_string(),
                "*.html".to_string(),
            ],
        }
    }
}
