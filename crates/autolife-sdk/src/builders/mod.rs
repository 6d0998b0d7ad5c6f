//! Build automation for iOS projects.
//!
//! This module drives `xcodebuild` and friends through the stages of an
//! App Store build:
//!
//! 1. **Locate** - find the `.xcworkspace` / `.xcodeproj` when not configured
//! 2. **Dependencies** - CocoaPods, Swift Package Manager or Carthage
//! 3. **Build** - `xcodebuild build` with signing overrides
//! 4. **Archive** - `xcodebuild archive` into an `.xcarchive`
//! 5. **Export** - `xcodebuild -exportArchive` with generated export options
//! 6. **Upload** - `xcrun altool --upload-app` to TestFlight
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`ios`] | [`IosBuilder`], the stage implementations |
//! | [`signing`] | `CODE_SIGN_*` build setting overrides |
//! | [`export`] | Export options plist and package resolution |
//! | [`upload`] | `altool` invocation for each credential scheme |
//! | [`deps`] | Dependency manager detection and installation |
//! | [`standard`] | [`StandardBuilder`] for projects in other languages |
//!
//! ## Example
//!
//! ```no_run
//! use autolife_sdk::builders::IosBuilder;
//! use autolife_sdk::runner::SystemRunner;
//! use autolife_sdk::{BuildTarget, SigningPolicy};
//!
//! let runner = SystemRunner;
//! let signing = SigningPolicy::Automatic {
//!     team_id: "ABCDE12345".into(),
//!     bundle_id: String::new(),
//! };
//! let mut builder = IosBuilder::new(&runner, ".", BuildTarget::new("App"), signing);
//! builder.locate();
//! builder.build()?;
//! let archive = builder.archive()?;
//! let ipa = builder.export_ipa(&archive)?;
//! println!("IPA at {}", ipa.display());
//! # Ok::<(), autolife_sdk::AutolifeError>(())
//! ```

pub mod common;
pub mod deps;
pub mod export;
pub mod ios;
pub mod signing;
pub mod standard;
pub mod upload;

pub use common::locate_project;
pub use deps::{DependencyManager, install_dependencies};
pub use export::{render_export_options, resolve_ipa};
pub use ios::IosBuilder;
pub use signing::signing_args;
pub use standard::StandardBuilder;
pub use upload::upload_invocation;
