//! `frame` subcommand: raw CADU bytes (or already byte-aligned hard-bit data)
//! synchronized, derandomized, and Reed-Solomon corrected into VCDU frames.

use std::collections::HashMap;
use std::fs::File;
use std::io::{stdout, BufReader, Write};
use std::path::Path;

use anyhow::{Context, Result};
use handlebars::handlebars_helper;
use lrpt::framing::{DefaultReedSolomon, FramingConfig, Integrity, Pipeline, Vcid};
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub enum Format {
    Json,
    Text,
}

impl clap::ValueEnum for Format {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Json, Self::Text]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        match self {
            Self::Json => Some(clap::builder::PossibleValue::new("json")),
            Self::Text => Some(clap::builder::PossibleValue::new("text")),
        }
    }
}

#[derive(Default, Debug, Clone, Serialize)]
struct Summary {
    total_frames: usize,
    total_bytes: usize,
    missing_frames: usize,
    corrected: usize,
    uncorrectable: usize,
    ok: usize,
    not_performed: usize,
}

#[derive(Debug, Clone, Serialize)]
struct Report {
    filename: String,
    summary: Summary,
    vcids: Vec<(Vcid, Summary)>,
}

/// Decodes `srcpath` into VCDU frames, writing byte-aligned, derandomized,
/// check-symbol-free frame data to `dstpath`.
///
/// `include`/`exclude` restrict the VCIDs written; an empty `include` means
/// all VCIDs are eligible. When `correct` is `false`, Reed-Solomon check
/// symbols are stripped but no error detection or correction is attempted;
/// when `true`, uncorrectable frames are dropped.
#[allow(clippy::too_many_arguments)]
pub fn frame(
    srcpath: &Path,
    dstpath: &Path,
    include: &[Vcid],
    exclude: &[Vcid],
    correct: bool,
    format: &Format,
) -> Result<()> {
    let config = FramingConfig::meteor_m_n2();

    let mut pipeline = Pipeline::new();
    if !config.derandomize {
        pipeline = pipeline.without_pn();
    }
    let rs = DefaultReedSolomon::new(config.rs_interleave)
        .with_virtual_fill(config.rs_virtual_fill)
        .with_detection(correct);
    pipeline = pipeline.with_integrity(Box::new(rs));

    let src = BufReader::new(File::open(srcpath).context("opening source")?);
    let frames = pipeline.start(src, config.codeblock_len());

    let mut dst = File::create(dstpath).with_context(|| format!("creating {dstpath:?}"))?;

    let mut report = Report {
        filename: srcpath.file_name().unwrap().to_string_lossy().to_string(),
        summary: Summary::default(),
        vcids: Vec::default(),
    };
    let mut vcids: HashMap<Vcid, Summary> = HashMap::default();

    for decoded in frames {
        let vcid = decoded.frame.header.vcid;
        if !include.is_empty() && !include.contains(&vcid) {
            continue;
        }
        if !exclude.is_empty() && exclude.contains(&vcid) {
            continue;
        }

        debug!(
            header = ?decoded.frame.header,
            missing = decoded.missing,
            integrity = ?decoded.integrity,
            "frame"
        );

        report.summary.total_frames += 1;
        report.summary.total_bytes += decoded.frame.data.len();
        report.summary.missing_frames += decoded.missing as usize;
        let sum = vcids.entry(vcid).or_default();
        sum.total_frames += 1;
        sum.total_bytes += decoded.frame.data.len();
        sum.missing_frames += decoded.missing as usize;

        match decoded.integrity {
            Some(Integrity::Ok) => {
                sum.ok += 1;
                report.summary.ok += 1;
            }
            Some(Integrity::Corrected) => {
                sum.corrected += 1;
                report.summary.corrected += 1;
            }
            Some(Integrity::Uncorrectable) => {
                sum.uncorrectable += 1;
                report.summary.uncorrectable += 1;
                warn!(vcid, "uncorrectable frame dropped");
                continue;
            }
            Some(Integrity::Skipped) | None => {
                sum.not_performed += 1;
                report.summary.not_performed += 1;
            }
        }

        dst.write_all(&decoded.frame.data)?;
    }

    report.vcids = vcids.into_iter().collect();
    report.vcids.sort_by_key(|(k, _)| *k);

    match format {
        Format::Json => serde_json::to_writer_pretty(stdout(), &report)
            .context("serializing report to json"),
        Format::Text => {
            let data = render_text(&report).context("rendering report")?;
            stdout()
                .write_all(data.as_bytes())
                .context("writing report to stdout")
        }
    }
}

fn render_text(report: &Report) -> Result<String> {
    let mut hb = handlebars::Handlebars::new();

    handlebars_helper!(left_pad: |num: u64, v: Json| {
        let v = match v {
            serde_json::Value::String(s) => s.to_owned(),
            serde_json::Value::Null => String::new(),
            _ => v.to_string()
        };
        let mut num: usize = usize::try_from(num).unwrap();
        if num < v.len() {
            num = v.len();
        }
        let mut s = String::new();
        let padding = num - v.len();
        for _ in 0..padding {
            s.push(' ');
        }
        s.push_str(&v);
        s
    });
    hb.register_helper("lpad", Box::new(left_pad));
    hb.register_template_string("report", TEXT_TEMPLATE)
        .context("registering template")?;

    hb.render("report", &report).context("rendering text")
}

const TEXT_TEMPLATE: &str = r"{{ filename }}
===============================================================================================
VCIDs:    {{ #each vcids }}{{ this.[0] }}{{ #if @last }}{{ else }}, {{ /if }}{{ /each }}
Count:    {{ summary.total_frames }}
Missing:  {{ summary.missing_frames }}
Integrity:
    Ok:         {{ summary.ok }}
    Corrected:  {{ summary.corrected }}
    Failed:     {{ summary.uncorrectable }}
    NotChecked: {{ summary.not_performed }}
-----------------------------------------------------------------------------------------------
VCID     Count   Missing            Bytes        Ok Corrected    Failed  NotChecked
-----------------------------------------------------------------------------------------------
{{ #each vcids }}{{ lpad 4 this.[0] }}  {{ #with this.[1] }}{{ lpad 8 total_frames }}  {{ lpad 8 missing_frames }}  {{ lpad 15 total_bytes }}  {{ lpad 8 ok }}  {{ lpad 8 corrected }}  {{ lpad 8 uncorrectable }}  {{ lpad 8 not_performed }}{{ /with }}
{{/each }}
";
