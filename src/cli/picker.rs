//! Interactive profile picker for `falloff tui` without a path.
//!
//! Profiles are `*.txt` files under `FALLOFF_DATA_DIR` (or the working
//! directory). Each one is read up front so the list can show its sample count
//! and the phantom the window heuristic would pick.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use crate::domain::PhantomKind;
use crate::error::AppError;
use crate::fit::detect_phantom;
use crate::io::read_profile;

/// How deep below the data directory profiles are searched for.
const SEARCH_DEPTH: usize = 4;

const PROFILE_EXT: &str = "txt";

/// A discovered profile with what could be learned from reading it.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileEntry {
    pub path: PathBuf,
    /// `None` when the file does not parse as a profile.
    pub samples: Option<usize>,
    pub phantom: Option<PhantomKind>,
}

impl ProfileEntry {
    pub fn describe(path: PathBuf) -> Self {
        match read_profile(&path) {
            Ok(profile) => Self {
                samples: Some(profile.samples.len()),
                phantom: detect_phantom(&profile.samples).ok(),
                path,
            },
            Err(err) => {
                log::debug!("{}: {err}", path.display());
                Self {
                    path,
                    samples: None,
                    phantom: None,
                }
            }
        }
    }

    /// One menu line, e.g. `runs/a.txt  (60 samples, cube (water))`.
    pub fn label(&self) -> String {
        let name = relative_display(&self.path);
        match (self.samples, self.phantom) {
            (None, _) => format!("{name}  (unreadable)"),
            (Some(n), Some(kind)) => format!("{name}  ({n} samples, {})", kind.display_name()),
            (Some(n), None) => format!("{name}  ({n} samples, phantom undetected)"),
        }
    }
}

/// What the user typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Choice {
    Index(usize),
    Path(PathBuf),
    Quit,
    OutOfRange(usize),
}

fn parse_choice(input: &str, count: usize) -> Choice {
    let input = input.trim();
    if input.eq_ignore_ascii_case("q") {
        return Choice::Quit;
    }
    match input.parse::<usize>() {
        Ok(n) if (1..=count).contains(&n) => Choice::Index(n - 1),
        Ok(n) => Choice::OutOfRange(n),
        Err(_) => Choice::Path(PathBuf::from(input)),
    }
}

/// List the profiles in the data directory and let the user pick one.
pub fn prompt_for_profile_path() -> Result<PathBuf, AppError> {
    let root = data_dir();
    let entries: Vec<ProfileEntry> = find_profiles(&root, SEARCH_DEPTH)
        .into_iter()
        .map(ProfileEntry::describe)
        .collect();
    if entries.is_empty() {
        return Err(AppError::new(
            2,
            format!(
                "No .{PROFILE_EXT} profiles under '{}'. Pass one with `falloff tui <PROFILE>` or set FALLOFF_DATA_DIR.",
                root.display()
            ),
        ));
    }

    println!("Profiles under {}:", root.display());
    for (i, entry) in entries.iter().enumerate() {
        println!("{:>3}) {}", i + 1, entry.label());
    }

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("Profile number or path (q to quit): ");
        io::stdout()
            .flush()
            .map_err(|e| AppError::new(2, format!("Failed to write prompt: {e}")))?;

        let Some(line) = lines.next() else {
            return Err(AppError::new(2, "No profile chosen (end of input)."));
        };
        let line = line.map_err(|e| AppError::new(2, format!("Failed to read input: {e}")))?;

        match parse_choice(&line, entries.len()) {
            Choice::Quit => return Err(AppError::new(2, "Canceled.")),
            Choice::Index(i) => return validate_profile_path(&entries[i].path),
            Choice::OutOfRange(n) => println!("No profile {n}; choose 1-{}.", entries.len()),
            Choice::Path(path) => match validate_profile_path(&path) {
                Ok(path) => return Ok(path),
                Err(err) => println!("{err}"),
            },
        }
    }
}

/// Check that `path` names an existing regular file.
pub fn validate_profile_path(path: &Path) -> Result<PathBuf, AppError> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => Ok(path.to_path_buf()),
        Ok(_) => Err(AppError::new(2, format!("Not a file: {}", path.display()))),
        Err(_) => Err(AppError::new(2, format!("Profile not found: {}", path.display()))),
    }
}

/// Directory searched by the picker.
pub fn data_dir() -> PathBuf {
    std::env::var_os("FALLOFF_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// `*.txt` files at most `max_depth` directories below `root`, sorted by path.
pub fn find_profiles(root: &Path, max_depth: usize) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut pending = vec![(root.to_path_buf(), 0usize)];

    while let Some((dir, depth)) = pending.pop() {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let Ok(kind) = entry.file_type() else {
                continue;
            };
            if kind.is_dir() {
                if depth < max_depth && !is_build_dir(&path) {
                    pending.push((path, depth + 1));
                }
            } else if kind.is_file() && has_profile_ext(&path) {
                found.push(path);
            }
        }
    }

    found.sort_by_key(|p| relative_display(p));
    found
}

fn has_profile_ext(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(PROFILE_EXT))
}

fn is_build_dir(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .is_some_and(|name| matches!(name, ".git" | "target" | "node_modules"))
}

fn relative_display(path: &Path) -> String {
    path.strip_prefix("./").unwrap_or(path).display().to_string()
}
