//! Path resolution for asset categories.
//!
//! Every category has a fixed source subdirectory under the source root and a
//! fixed destination subdirectory under the build root:
//!
//! | category | source    | build   |
//! |----------|-----------|---------|
//! | styles   | `styles`  | `css`   |
//! | scripts  | `scripts` | `js`    |
//! | images   | `images`  | `img`   |
//! | fonts    | `fonts`   | `fonts` |
//! | icons    | `icons`   | `icons` |
//! | svg      | `svg`     | `svg`   |
//!
//! Nothing here touches the filesystem. A missing directory is only noticed
//! when a task tries to read it.

use std::path::{Path, PathBuf};

/// Name of the optional third-party subfolder inside a source directory.
pub const VENDORS_DIR: &str = "vendors";

/// Logical asset categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Styles,
    Scripts,
    Images,
    Fonts,
    Icons,
    Svg,
}

impl AssetKind {
    pub const ALL: [AssetKind; 6] = [
        AssetKind::Styles,
        AssetKind::Scripts,
        AssetKind::Images,
        AssetKind::Fonts,
        AssetKind::Icons,
        AssetKind::Svg,
    ];

    /// Subdirectory name under the source root.
    pub fn source_name(self) -> &'static str {
        match self {
            AssetKind::Styles => "styles",
            AssetKind::Scripts => "scripts",
            AssetKind::Images => "images",
            AssetKind::Fonts => "fonts",
            AssetKind::Icons => "icons",
            AssetKind::Svg => "svg",
        }
    }

    /// Subdirectory name under the build root.
    pub fn build_name(self) -> &'static str {
        match self {
            AssetKind::Styles => "css",
            AssetKind::Scripts => "js",
            AssetKind::Images => "img",
            AssetKind::Fonts => "fonts",
            AssetKind::Icons => "icons",
            AssetKind::Svg => "svg",
        }
    }
}

/// One directory per asset category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetDirs {
    pub styles: PathBuf,
    pub scripts: PathBuf,
    pub images: PathBuf,
    pub fonts: PathBuf,
    pub icons: PathBuf,
    pub svg: PathBuf,
}

impl AssetDirs {
    pub fn get(&self, kind: AssetKind) -> &Path {
        match kind {
            AssetKind::Styles => &self.styles,
            AssetKind::Scripts => &self.scripts,
            AssetKind::Images => &self.images,
            AssetKind::Fonts => &self.fonts,
            AssetKind::Icons => &self.icons,
            AssetKind::Svg => &self.svg,
        }
    }
}

/// Source and build directories for every category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryMap {
    pub src_root: PathBuf,
    pub build_root: PathBuf,
    pub src: AssetDirs,
    pub build: AssetDirs,
}

impl DirectoryMap {
    /// Compute the map from the two roots. Roots are taken as given.
    pub fn resolve(src_root: impl AsRef<Path>, build_root: impl AsRef<Path>) -> Self {
        let src_root = src_root.as_ref().to_path_buf();
        let build_root = build_root.as_ref().to_path_buf();
        let at = |root: &Path, name: fn(AssetKind) -> &'static str| AssetDirs {
            styles: root.join(name(AssetKind::Styles)),
            scripts: root.join(name(AssetKind::Scripts)),
            images: root.join(name(AssetKind::Images)),
            fonts: root.join(name(AssetKind::Fonts)),
            icons: root.join(name(AssetKind::Icons)),
            svg: root.join(name(AssetKind::Svg)),
        };

        Self {
            src: at(&src_root, AssetKind::source_name),
            build: at(&build_root, AssetKind::build_name),
            src_root,
            build_root,
        }
    }
}

/// The `vendors` subfolder of a source directory.
pub fn vendors(dir: &Path) -> PathBuf {
    dir.join(VENDORS_DIR)
}
