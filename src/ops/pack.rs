//! Implementation of `keel lib`: pack intermediates and localization files
//! into one library.
//!
//! ## Usage
//!
//! ```bash
//! keel lib -o product.wixlib obj/*.wixobj -l strings/en-us.wxl
//! keel lib -o product.wixlib obj/*.wixobj --bind-path bin --bind-path assets
//! keel lib -o product.wixlib obj/*.wixobj --no-payloads
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use flate2::Compression;

use crate::core::container::PayloadEntry;
use crate::core::intermediate::Intermediate;
use crate::core::library::{BinaryResolver, Library, SearchPathResolver};
use crate::core::localization::Localization;
use crate::util::context::GlobalContext;
use crate::util::diagnostic::{Diagnostic, DiagnosticSink, Messages};
use crate::util::fs::glob_files;

/// Options for packing a library.
#[derive(Debug, Clone, Default)]
pub struct PackOptions {
    /// Intermediate files or glob patterns, relative to the working directory
    pub inputs: Vec<String>,

    /// Localization files or glob patterns
    pub localizations: Vec<String>,

    /// Destination of the library container
    pub output: PathBuf,

    /// Bind paths; replace the configured ones when non-empty
    pub bind_paths: Vec<PathBuf>,

    /// Skip payload resolution and write a library without payloads
    pub no_payloads: bool,

    /// Accept inputs written by another format version
    pub suppress_version_check: bool,

    /// gzip level, overriding the configured one
    pub compression: Option<u32>,
}

/// What a successful pack produced.
#[derive(Debug, Clone)]
pub struct PackResult {
    pub output: PathBuf,
    pub sections: usize,
    pub cultures: Vec<String>,
    pub payloads: Vec<PayloadEntry>,
}

/// Load every input, merge localizations by culture and save the library.
///
/// Content problems in the inputs and unresolvable payloads are reported to
/// `messages`; the library is only written when there are none. Inputs that
/// contribute nothing are reported as warnings.
pub fn pack(ctx: &GlobalContext, opts: &PackOptions, messages: &mut Messages) -> Result<PackResult> {
    if opts.inputs.is_empty() {
        bail!("no intermediates to pack");
    }

    let schema = ctx.table_definitions()?;
    let suppress = opts.suppress_version_check || ctx.config().library.suppress_version_check;

    let mut library = Library::new();
    for path in glob_files(ctx.cwd(), &opts.inputs)? {
        let sink: &mut dyn DiagnosticSink = &mut *messages;
        let intermediate = Intermediate::load_with_sink(&path, &schema, suppress, Some(sink))
            .with_context(|| format!("failed to load intermediate {}", path.display()))?;
        tracing::debug!(
            "adding {} section(s) from {}",
            intermediate.sections().len(),
            path.display()
        );
        if intermediate.sections().is_empty() {
            messages.report(
                Diagnostic::warning("intermediate contains no sections")
                    .with_code("EmptyIntermediate")
                    .with_location(path.display().to_string()),
            );
        }
        for section in intermediate.into_sections() {
            library.add_section(section);
        }
    }

    let localization_files = if opts.localizations.is_empty() {
        Vec::new()
    } else {
        glob_files(ctx.cwd(), &opts.localizations)?
    };
    for path in localization_files {
        let sink: &mut dyn DiagnosticSink = &mut *messages;
        let localization = Localization::load_with_sink(&path, Some(sink))
            .with_context(|| format!("failed to load localization {}", path.display()))?;
        if localization.variables().next().is_none() && localization.controls().next().is_none() {
            messages.report(
                Diagnostic::warning(format!(
                    "localization `{}` defines no strings or controls",
                    localization.culture()
                ))
                .with_code("EmptyLocalization")
                .with_location(path.display().to_string()),
            );
        }
        library
            .add_localization(localization)
            .with_context(|| format!("failed to merge localization {}", path.display()))?;
    }

    if messages.encountered_error() {
        bail!(
            "could not pack `{}` due to {} previous error(s)",
            opts.output.display(),
            messages.error_count()
        );
    }

    let bind_paths = if opts.bind_paths.is_empty() {
        ctx.bind_paths()
    } else {
        opts.bind_paths.iter().map(|p| ctx.resolve(p)).collect()
    };
    let resolver = SearchPathResolver::new(bind_paths);
    let resolver: Option<&dyn BinaryResolver> = if opts.no_payloads {
        None
    } else {
        Some(&resolver)
    };

    let compression = match opts.compression {
        Some(level) => Compression::new(level.min(9)),
        None => ctx.config().compression(),
    };

    let output = ctx.resolve(&opts.output);
    let payloads = library
        .save_with_compression(&output, resolver, messages, compression)
        .with_context(|| format!("failed to write library {}", output.display()))?;

    Ok(PackResult {
        output,
        sections: library.sections().len(),
        cultures: library
            .all_localizations()
            .map(|l| l.culture().to_string())
            .collect(),
        payloads,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::section::SectionType;
    use crate::test_support::{
        binary_section, localization_xml, property_section, test_schema, write_file,
    };
    use crate::util::config::Config;
    use std::path::Path;
    use tempfile::TempDir;

    fn context(dir: &Path) -> GlobalContext {
        GlobalContext::with_cwd(dir.to_path_buf())
            .unwrap()
            .with_config(Config::default())
    }

    fn options(inputs: &[&str], output: &str) -> PackOptions {
        PackOptions {
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            output: PathBuf::from(output),
            ..Default::default()
        }
    }

    #[test]
    fn test_pack_sections_and_localizations() {
        let tmp = TempDir::new().unwrap();
        let schema = test_schema();
        Intermediate::from_sections([property_section(&schema, SectionType::Product, &["A"])])
            .save(&tmp.path().join("obj/a.wixobj"))
            .unwrap();
        Intermediate::from_sections([property_section(&schema, SectionType::Fragment, &["B"])])
            .save(&tmp.path().join("obj/b.wixobj"))
            .unwrap();
        write_file(
            tmp.path(),
            "en-us.wxl",
            localization_xml("en-US", r#"<String Id="Title">Setup</String>"#),
        );
        write_file(
            tmp.path(),
            "en-us-extra.wxl",
            localization_xml("en-us", r#"<String Id="Exit">Exit</String>"#),
        );

        let mut opts = options(&["obj/*.wixobj"], "out/product.wixlib");
        opts.localizations = vec!["*.wxl".to_string()];

        let mut messages = Messages::new();
        let result = pack(&context(tmp.path()), &opts, &mut messages).unwrap();
        assert_eq!(result.sections, 2);
        assert_eq!(result.cultures, vec!["en-us"]);
        assert!(result.payloads.is_empty());

        let library = Library::open(&result.output, &schema, false).unwrap();
        let en_us = library.localization("EN-US").unwrap();
        assert_eq!(en_us.variables().count(), 2);
    }

    #[test]
    fn test_pack_embeds_payloads_from_bind_paths() {
        let tmp = TempDir::new().unwrap();
        let schema = test_schema();
        Intermediate::from_sections([binary_section(&schema, &[("Logo", "logo.png")])])
            .save(&tmp.path().join("a.wixobj"))
            .unwrap();
        write_file(tmp.path(), "assets/logo.png", b"png");

        let mut opts = options(&["a.wixobj"], "a.wixlib");
        opts.bind_paths = vec![PathBuf::from("assets")];

        let mut messages = Messages::new();
        let result = pack(&context(tmp.path()), &opts, &mut messages).unwrap();
        assert_eq!(result.payloads.len(), 1);
        assert_eq!(result.payloads[0].name, "logo.png");
        assert_eq!(result.payloads[0].size, 3);
    }

    #[test]
    fn test_pack_reports_every_missing_payload() {
        let tmp = TempDir::new().unwrap();
        let schema = test_schema();
        Intermediate::from_sections([binary_section(
            &schema,
            &[("Logo", "logo.png"), ("Banner", "banner.bmp")],
        )])
        .save(&tmp.path().join("a.wixobj"))
        .unwrap();

        let mut messages = Messages::new();
        let err = pack(
            &context(tmp.path()),
            &options(&["a.wixobj"], "a.wixlib"),
            &mut messages,
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("a.wixlib"));
        assert_eq!(messages.with_code("FileNotFound").count(), 2);
        assert!(!tmp.path().join("a.wixlib").exists());
    }

    #[test]
    fn test_pack_without_payloads() {
        let tmp = TempDir::new().unwrap();
        let schema = test_schema();
        Intermediate::from_sections([binary_section(&schema, &[("Logo", "logo.png")])])
            .save(&tmp.path().join("a.wixobj"))
            .unwrap();

        let mut opts = options(&["a.wixobj"], "a.wixlib");
        opts.no_payloads = true;

        let mut messages = Messages::new();
        let result = pack(&context(tmp.path()), &opts, &mut messages).unwrap();
        assert!(result.payloads.is_empty());
        assert!(!messages.encountered_error());
    }

    #[test]
    fn test_pack_stops_on_localization_content_errors() {
        let tmp = TempDir::new().unwrap();
        let schema = test_schema();
        Intermediate::from_sections([property_section(&schema, SectionType::Fragment, &["A"])])
            .save(&tmp.path().join("a.wixobj"))
            .unwrap();
        write_file(
            tmp.path(),
            "bad.wxl",
            localization_xml("en-us", r#"<String Id="X" Overridable="maybe">x</String>"#),
        );

        let mut opts = options(&["a.wixobj"], "a.wixlib");
        opts.localizations = vec!["bad.wxl".to_string()];

        let mut messages = Messages::new();
        let err = pack(&context(tmp.path()), &opts, &mut messages).unwrap_err();
        assert!(err.to_string().contains("1 previous error"));
        assert!(!tmp.path().join("a.wixlib").exists());
    }

    #[test]
    fn test_pack_warns_about_empty_inputs() {
        let tmp = TempDir::new().unwrap();
        let schema = test_schema();
        Intermediate::from_sections([property_section(&schema, SectionType::Fragment, &["A"])])
            .save(&tmp.path().join("a.wixobj"))
            .unwrap();
        Intermediate::new().save(&tmp.path().join("empty.wixobj")).unwrap();
        write_file(tmp.path(), "fr-fr.wxl", localization_xml("fr-fr", ""));

        let mut opts = options(&["a.wixobj", "empty.wixobj"], "a.wixlib");
        opts.localizations = vec!["fr-fr.wxl".to_string()];

        let mut messages = Messages::new();
        let result = pack(&context(tmp.path()), &opts, &mut messages).unwrap();
        assert_eq!(result.sections, 1);
        assert!(!messages.encountered_error());
        assert_eq!(messages.with_code("EmptyIntermediate").count(), 1);
        assert_eq!(messages.with_code("EmptyLocalization").count(), 1);

        let mut strict = Messages::new().with_warnings_as_errors(true);
        let err = pack(&context(tmp.path()), &opts, &mut strict).unwrap_err();
        assert!(err.to_string().contains("2 previous error(s)"));
    }

    #[test]
    fn test_pack_rejects_unmatched_input() {
        let tmp = TempDir::new().unwrap();
        let mut messages = Messages::new();
        let err = pack(
            &context(tmp.path()),
            &options(&["*.wixobj"], "a.wixlib"),
            &mut messages,
        )
        .unwrap_err();
        assert!(err.to_string().contains("no input matches"));
    }
}
