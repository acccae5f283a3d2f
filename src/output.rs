//! Vocabulary and report files.
//!
//! A snapshot named `<prefix>.<n>` consists of
//! - `<prefix>.<n>.json`: BPE tokenizer model with the learned vocabulary
//!   and merges,
//! - `<prefix>.<n>.poses`: one line per merged token with its frequency at
//!   merge time, its frequency in the sequence and every `seq:pos` where it
//!   occurs,
//! - `<prefix>.<n>.bpe`: the encoded sequence, final snapshot only.

use std::{
    ffi::OsString,
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use log::info;
use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::{
    alphabet::{ALPHABET, CLS, N_SPECIAL_TOKENS, SEP, SEPARATOR, UNK, Vocabulary},
    error::OutputError,
    types::{MergeRecord, Token},
};

#[derive(Debug, Serialize)]
struct TokenizerFile {
    version: &'static str,
    truncation: Option<Value>,
    padding: Option<Value>,
    added_tokens: Vec<AddedToken>,
    normalizer: Value,
    pre_tokenizer: Value,
    post_processor: Value,
    decoder: Value,
    model: BpeModel,
}

#[derive(Debug, Serialize)]
struct AddedToken {
    id: Token,
    content: &'static str,
    single_word: bool,
    lstrip: bool,
    rstrip: bool,
    normalized: bool,
    special: bool,
}

#[derive(Debug, Serialize)]
struct BpeModel {
    #[serde(rename = "type")]
    kind: &'static str,
    dropout: Option<f32>,
    unk_token: &'static str,
    continuing_subword_prefix: Option<String>,
    end_of_word_suffix: Option<String>,
    fuse_unk: bool,
    vocab: Map<String, Value>,
    merges: Vec<String>,
}

fn tokenizer_file(
    merges: &[MergeRecord],
    vocab: &Vocabulary,
) -> Result<TokenizerFile, OutputError> {
    let added_tokens = ALPHABET[..usize::from(N_SPECIAL_TOKENS)]
        .iter()
        .zip(0..)
        .map(|(&content, id)| AddedToken {
            id,
            content,
            single_word: false,
            lstrip: false,
            rstrip: false,
            normalized: false,
            special: true,
        })
        .collect();

    let mut vocab_map = Map::new();
    for (id, symbol) in ALPHABET.iter().enumerate() {
        vocab_map.insert((*symbol).to_string(), Value::from(id));
    }
    let mut merge_strings = Vec::with_capacity(merges.len());
    for record in merges {
        vocab_map.insert(
            vocab.render(record.token)?.to_string(),
            Value::from(record.token),
        );
        merge_strings.push(format!(
            "{} {}",
            vocab.render(record.pair.left())?,
            vocab.render(record.pair.right())?
        ));
    }

    let separator = ALPHABET[usize::from(SEPARATOR)];
    Ok(TokenizerFile {
        version: "1.0",
        truncation: None,
        padding: None,
        added_tokens,
        normalizer: json!({
            "type": "Sequence",
            "normalizers": [{ "type": "Strip", "strip_left": true, "strip_right": true }]
        }),
        pre_tokenizer: json!({
            "type": "Sequence",
            "pretokenizers": [
                { "type": "Split", "pattern": { "String": separator }, "behavior": "Isolated", "invert": false },
                { "type": "Split", "pattern": { "String": "\n" }, "behavior": "Isolated", "invert": false }
            ]
        }),
        post_processor: json!({
            "type": "BertProcessing",
            "sep": [ALPHABET[usize::from(SEP)], SEP],
            "cls": [ALPHABET[usize::from(CLS)], CLS]
        }),
        decoder: json!({ "type": "BPEDecoder", "suffix": " " }),
        model: BpeModel {
            kind: "BPE",
            dropout: None,
            unk_token: ALPHABET[usize::from(UNK)],
            continuing_subword_prefix: None,
            end_of_word_suffix: None,
            fuse_unk: false,
            vocab: vocab_map,
            merges: merge_strings,
        },
    })
}

/// Writes the tokenizer model as pretty-printed JSON.
pub fn write_model<W: Write>(
    mut writer: W,
    merges: &[MergeRecord],
    vocab: &Vocabulary,
) -> Result<(), OutputError> {
    let file = tokenizer_file(merges, vocab)?;
    serde_json::to_writer_pretty(&mut writer, &file)?;
    writeln!(writer)?;
    Ok(())
}

/// Where each token occurs in `tokens`, as `(sequence, offset)` pairs.
///
/// Sequences are delimited by the separator token; offsets count
/// characters of the rendered tokens.
fn occurrences(
    tokens: &[Token],
    vocab: &Vocabulary,
) -> Result<FxHashMap<Token, Vec<(usize, usize)>>, OutputError> {
    let mut found: FxHashMap<Token, Vec<(usize, usize)>> = FxHashMap::default();
    let mut seq = 0;
    let mut pos = 0;
    for &token in tokens {
        if token == SEPARATOR {
            seq += 1;
            pos = 0;
        } else {
            found.entry(token).or_default().push((seq, pos));
            pos += vocab.render(token)?.len();
        }
    }
    Ok(found)
}

/// Writes one line per merged token:
/// `token\tfreq_at_merge\tfreq_in_sequence\tseq:pos seq:pos ...`.
///
/// With `skip_absent`, tokens that no longer occur in `tokens` are left out.
pub fn write_poses<W: Write>(
    mut writer: W,
    merges: &[MergeRecord],
    vocab: &Vocabulary,
    tokens: &[Token],
    skip_absent: bool,
) -> Result<(), OutputError> {
    let found = occurrences(tokens, vocab)?;
    for record in merges {
        let positions = found.get(&record.token).map_or(&[][..], Vec::as_slice);
        if skip_absent && positions.is_empty() {
            continue;
        }
        write!(
            writer,
            "{}\t{}\t{}\t",
            vocab.render(record.token)?,
            record.freq,
            positions.len()
        )?;
        for (seq, pos) in positions {
            write!(writer, "{seq}:{pos} ")?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

/// Writes the encoded sequence: tokens separated by spaces, one sequence
/// per line.
pub fn write_encoding<W: Write>(
    mut writer: W,
    vocab: &Vocabulary,
    tokens: &[Token],
) -> Result<(), OutputError> {
    for &token in tokens {
        if token == SEPARATOR {
            writeln!(writer)?;
        } else {
            write!(writer, "{} ", vocab.render(token)?)?;
        }
    }
    writeln!(writer)?;
    Ok(())
}

/// Files written by [`save_snapshot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotPaths {
    pub model: PathBuf,
    pub poses: PathBuf,
    pub encoding: Option<PathBuf>,
}

/// `<prefix>.<label>.<ext>`, keeping any dots already in `prefix`.
fn snapshot_path(prefix: &Path, label: usize, ext: &str) -> PathBuf {
    let mut name = OsString::from(prefix.as_os_str());
    name.push(format!(".{label}.{ext}"));
    PathBuf::from(name)
}

/// Writes the snapshot labelled `label` next to `prefix`.
///
/// `is_final` adds the `.bpe` encoding and drops merged tokens absent from
/// the sequence from the `.poses` report.
pub fn save_snapshot(
    prefix: &Path,
    label: usize,
    merges: &[MergeRecord],
    tokens: &[Token],
    is_final: bool,
) -> Result<SnapshotPaths, OutputError> {
    let vocab = Vocabulary::from_merges(merges)?;

    let model = snapshot_path(prefix, label, "json");
    let mut writer = BufWriter::new(File::create(&model)?);
    write_model(&mut writer, merges, &vocab)?;
    writer.flush()?;

    let poses = snapshot_path(prefix, label, "poses");
    let mut writer = BufWriter::new(File::create(&poses)?);
    write_poses(&mut writer, merges, &vocab, tokens, is_final)?;
    writer.flush()?;

    let encoding = if is_final {
        let path = snapshot_path(prefix, label, "bpe");
        let mut writer = BufWriter::new(File::create(&path)?);
        write_encoding(&mut writer, &vocab, tokens)?;
        writer.flush()?;
        Some(path)
    } else {
        None
    };

    info!("saved snapshot {label} to {}", model.display());
    Ok(SnapshotPaths {
        model,
        poses,
        encoding,
    })
}
