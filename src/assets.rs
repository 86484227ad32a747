//! The project's asset tasks.
//!
//! | task                 | sources                                   | stages                                   | destination |
//! |----------------------|-------------------------------------------|------------------------------------------|-------------|
//! | `opt-images`         | `images/**/*.{png,svg,jpg,jpeg,gif,ico}`  | changed, image optimizer                 | `img`       |
//! | `icons`              | `icons/**/*.svg`                          | sprite assembler (`symbols.svg`)         | `icons`     |
//! | `svg`                | `svg/**/*.svg`                            | svg optimizer                            | `svg`       |
//! | `fonts`              | `fonts/**/*`                              | copy                                     | `fonts`     |
//! | `copy-vendor-styles` | `styles/vendors/*`                        | copy                                     | `css`       |
//! | `styles`             | `styles/*.css`                            | css processor, css minifier (production) | `css`       |
//! | `styles:<stem>`      | one file in `styles/`                     | as `styles`, then rename-to-self         | `css`       |
//! | `scripts-deps`       | `scripts/vendors/**/*.js`                 | concat `vendors.js`, js minifier         | `js`        |
//! | `scripts-main`       | `scripts/index.js`                        | bundler                                  | `js`        |

use std::sync::Arc;

use crate::gate::Gate;
use crate::paths::{vendors, DirectoryMap};
use crate::stages::{Changed, Concat, Rename, StageRef, ToolBatch, ToolFilter};
use crate::task::{SourceFile, SourceSet, Task, TaskRegistry};
use crate::toolchain::{ToolCommand, Toolchain};
use crate::util::file_stem;
use crate::watch::WatchSubscription;

pub const OPT_IMAGES: &str = "opt-images";
pub const ICONS: &str = "icons";
pub const SVG: &str = "svg";
pub const FONTS: &str = "fonts";
pub const COPY_VENDOR_STYLES: &str = "copy-vendor-styles";
pub const STYLES: &str = "styles";
pub const SCRIPTS_DEPS: &str = "scripts-deps";
pub const SCRIPTS_MAIN: &str = "scripts-main";

/// Prefix of the per-file style tasks.
pub const STYLE_FILE_PREFIX: &str = "styles:";

const SCRIPT_ENTRY: &str = "index.js";
const VENDOR_BUNDLE: &str = "vendors.js";

/// Builds the task set from the directory map, toolchain and gate.
pub struct AssetTasks<'a> {
    dirs: DirectoryMap,
    toolchain: &'a Toolchain,
    gate: &'a Gate,
}

impl<'a> AssetTasks<'a> {
    pub fn new(toolchain: &'a Toolchain, gate: &'a Gate) -> Self {
        Self {
            dirs: gate.config().directories(),
            toolchain,
            gate,
        }
    }

    fn filter(label: &str, tool: &ToolCommand) -> StageRef {
        Arc::new(ToolFilter::new(label, tool.clone()))
    }

    fn style_stages(&self, task: Task) -> Task {
        task.stage(Self::filter("css-processor", &self.toolchain.css_processor))
            .stage(
                self.gate
                    .production_only(Self::filter("css-minifier", &self.toolchain.css_minifier)),
            )
    }

    /// Register every task. Fails if the styles directory is missing.
    pub fn register(&self, registry: &mut TaskRegistry) -> anyhow::Result<()> {
        let src = &self.dirs.src;
        let build = &self.dirs.build;

        registry.register(
            Task::new(
                OPT_IMAGES,
                "Opt images",
                SourceSet::new(&src.images, &["**/*.{png,svg,jpg,jpeg,gif,ico}"])?,
                &build.images,
            )
            .stage(Arc::new(Changed::since(&build.images)))
            .stage(Self::filter("image-optimizer", &self.toolchain.image_optimizer)),
        );

        registry.register(
            Task::new(ICONS, "SVG icons", SourceSet::new(&src.icons, &["**/*.svg"])?, &build.icons)
                .stage(Arc::new(ToolBatch::new(
                    "sprite-assembler",
                    self.toolchain.sprite_assembler.clone(),
                ))),
        );

        registry.register(
            Task::new(SVG, "SVG", SourceSet::new(&src.svg, &["**/*.svg"])?, &build.svg)
                .stage(Self::filter("svg-optimizer", &self.toolchain.svg_optimizer)),
        );

        registry.register(Task::new(
            FONTS,
            "Fonts",
            SourceSet::new(&src.fonts, &["**/*"])?,
            &build.fonts,
        ));

        registry.register(Task::new(
            COPY_VENDOR_STYLES,
            "Vendor styles",
            SourceSet::new(vendors(&src.styles), &["*"])?,
            &build.styles,
        ));

        registry.register(self.style_stages(Task::new(
            STYLES,
            "Styles",
            SourceSet::new(&src.styles, &["*.css"])?,
            &build.styles,
        )));

        registry.register_for_each_file(
            &src.styles,
            |file: &SourceFile| format!("{}{}", STYLE_FILE_PREFIX, file_stem(&file.path)),
            |name, file| {
                let task = Task::new(
                    name,
                    format!("Styles ({})", file.name),
                    SourceSet::single(&file.path)?,
                    &build.styles,
                );
                Ok(self.style_stages(task).stage(Arc::new(Rename::to(&file.name))))
            },
        )?;

        registry.register(
            Task::new(
                SCRIPTS_DEPS,
                "Dependencies scripts",
                SourceSet::new(&src.scripts, &["vendors/**/*.js"])?,
                &build.scripts,
            )
            .stage(Arc::new(Concat::new(VENDOR_BUNDLE)))
            .stage(Self::filter("js-minifier", &self.toolchain.js_minifier)),
        );

        registry.register(
            Task::new(
                SCRIPTS_MAIN,
                "Main scripts",
                SourceSet::new(&src.scripts, &[SCRIPT_ENTRY])?,
                &build.scripts,
            )
            .stage(Arc::new(ToolBatch::new("bundler", self.toolchain.bundler.clone()))),
        );

        tracing::info!("Registered {} tasks", registry.len());
        Ok(())
    }

    /// Tasks run by `build` and on `live` startup, in start order.
    pub fn default_tasks(&self) -> Vec<Option<String>> {
        vec![
            Some(OPT_IMAGES.to_string()),
            Some(ICONS.to_string()),
            Some(SVG.to_string()),
            Some(FONTS.to_string()),
            Some(COPY_VENDOR_STYLES.to_string()),
            Some(STYLES.to_string()),
            self.gate.initial_scripts(SCRIPTS_DEPS),
            self.gate.initial_scripts(SCRIPTS_MAIN),
        ]
    }
}

/// Glob (relative to the source root) to task names.
pub fn watch_subscriptions() -> anyhow::Result<Vec<WatchSubscription>> {
    Ok(vec![
        WatchSubscription::new("styles/**/*.css", &[STYLES])?,
        WatchSubscription::new("styles/vendors/**", &[COPY_VENDOR_STYLES])?,
        WatchSubscription::new("scripts/**/*.js", &[SCRIPTS_MAIN])?,
        WatchSubscription::new("scripts/vendors/**/*.js", &[SCRIPTS_DEPS])?,
        WatchSubscription::new("images/**/*.{png,svg,jpg,jpeg,gif,ico}", &[OPT_IMAGES])?,
        WatchSubscription::new("icons/**/*.svg", &[ICONS])?,
        WatchSubscription::new("svg/**/*.svg", &[SVG])?,
        WatchSubscription::new("fonts/**", &[FONTS])?,
    ])
}
