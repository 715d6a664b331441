//! Structural symbol extraction: imports, functions, and classes per file.
//!
//! This is enrichment only. Retrieval works without it; its output decorates
//! context blocks (function/class names next to a fragment) and feeds the
//! summary statistics. Extraction is line-oriented regex matching — close
//! enough for labels, deliberately not a parser. Python gets the full
//! treatment (params, docstrings, methods); other recognized languages get
//! name/line-level symbols.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use crate::config::FragmentingConfig;
use crate::error::Result;
use crate::fragment::collect_source_files;
use crate::models::RepoStats;

macro_rules! static_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).expect("static regex"))
        }
    };
}

static_regex!(py_def, r"^(\s*)def\s+(\w+)\s*\(([^)]*)\)");
static_regex!(py_class, r"^(\s*)class\s+(\w+)");
static_regex!(py_import, r"^\s*import\s+([\w.]+)");
static_regex!(py_from_import, r"^\s*from\s+([\w.]+)\s+import\s+(.+)");
static_regex!(rs_fn, r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?(?:unsafe\s+)?fn\s+(\w+)");
static_regex!(rs_type, r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:struct|enum|trait)\s+(\w+)");
static_regex!(rs_use, r"^\s*use\s+([\w:]+)");
static_regex!(js_fn, r"^\s*(?:export\s+)?(?:async\s+)?function\s+(\w+)\s*\(([^)]*)\)");
static_regex!(js_class, r"^\s*(?:export\s+)?class\s+(\w+)");
static_regex!(js_import, r#"^\s*import\s+.*?from\s+['"]([^'"]+)['"]"#);
static_regex!(go_func, r"^func\s+(?:\([^)]*\)\s*)?(\w+)\s*\(([^)]*)\)");
static_regex!(go_import, r#"^\s*import\s+"([^"]+)""#);
static_regex!(generic_def, r"^\s*(?:public|private|protected|static|final|\s)*\s*def\s+(\w+)");
static_regex!(java_class, r"^\s*(?:public\s+|abstract\s+|final\s+)*class\s+(\w+)");

/// A function or method symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionSymbol {
    pub name: String,
    /// 1-based line number.
    pub line: usize,
    pub params: Vec<String>,
    pub docstring: String,
}

/// A class symbol with its methods.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassSymbol {
    pub name: String,
    pub line: usize,
    pub methods: Vec<FunctionSymbol>,
    pub docstring: String,
}

/// Symbols of one file.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FileSymbols {
    pub imports: Vec<String>,
    pub functions: Vec<FunctionSymbol>,
    pub classes: Vec<ClassSymbol>,
}

/// Per-file symbol metadata for a whole snapshot.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    files: BTreeMap<String, FileSymbols>,
}

impl SymbolTable {
    pub fn insert(&mut self, path: impl Into<String>, symbols: FileSymbols) {
        self.files.insert(path.into(), symbols);
    }

    pub fn get(&self, path: &str) -> Option<&FileSymbols> {
        self.files.get(path)
    }

    pub fn files(&self) -> impl Iterator<Item = (&String, &FileSymbols)> {
        self.files.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Aggregate counts over the table, keyed off file extensions.
    pub fn stats(&self) -> RepoStats {
        let mut stats = RepoStats {
            total_files: self.files.len(),
            ..Default::default()
        };
        for (path, symbols) in &self.files {
            let ext = path.rsplit('.').next().unwrap_or_default().to_lowercase();
            *stats.files_by_extension.entry(ext).or_insert(0) += 1;
            stats.total_functions += symbols.functions.len()
                + symbols.classes.iter().map(|c| c.methods.len()).sum::<usize>();
            stats.total_classes += symbols.classes.len();
        }
        stats
    }
}

/// Extract symbols for every recognized file under `root`.
pub fn extract_symbols(root: &Path, config: &FragmentingConfig) -> Result<SymbolTable> {
    let mut table = SymbolTable::default();
    for file in collect_source_files(root, config)? {
        let text = match file.read_lossy() {
            Some(t) => t,
            None => continue,
        };
        let symbols = extract_file_symbols(&file.extension, &text);
        table.insert(file.relative_path, symbols);
    }
    Ok(table)
}

/// Extract symbols from one file's text based on its extension.
pub fn extract_file_symbols(extension: &str, text: &str) -> FileSymbols {
    match extension {
        "py" => extract_python(text),
        "rs" => extract_rust(text),
        "js" | "jsx" | "ts" | "tsx" => extract_javascript(text),
        "go" => extract_go(text),
        "java" | "rb" => extract_generic(text),
        _ => FileSymbols::default(),
    }
}

fn split_params(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|p| {
            p.trim()
                .split([':', '='])
                .next()
                .unwrap_or_default()
                .trim()
                .to_string()
        })
        .filter(|p| !p.is_empty())
        .collect()
}

/// First line of a Python docstring opening right after `def_line`.
fn python_docstring(lines: &[&str], def_line: usize) -> String {
    for line in lines.iter().skip(def_line + 1).take(3) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        for quote in ["\"\"\"", "'''"] {
            if let Some(rest) = trimmed.strip_prefix(quote) {
                return rest.trim_end_matches(quote).trim().to_string();
            }
        }
        break;
    }
    String::new()
}

fn extract_python(text: &str) -> FileSymbols {
    let lines: Vec<&str> = text.lines().collect();
    let mut symbols = FileSymbols::default();
    // Indentation of the innermost open class body, if any.
    let mut class_indent: Option<usize> = None;

    for (i, line) in lines.iter().enumerate() {
        if let Some(caps) = py_import().captures(line) {
            symbols.imports.push(caps[1].to_string());
            continue;
        }
        if let Some(caps) = py_from_import().captures(line) {
            let module = &caps[1];
            for name in caps[2].split(',') {
                let name = name.trim().trim_end_matches('\\').trim();
                if !name.is_empty() {
                    symbols.imports.push(format!("{}.{}", module, name));
                }
            }
            continue;
        }

        if let Some(caps) = py_class().captures(line) {
            let indent = caps[1].len();
            symbols.classes.push(ClassSymbol {
                name: caps[2].to_string(),
                line: i + 1,
                methods: Vec::new(),
                docstring: python_docstring(&lines, i),
            });
            class_indent = Some(indent);
            continue;
        }

        if let Some(caps) = py_def().captures(line) {
            let indent = caps[1].len();
            let function = FunctionSymbol {
                name: caps[2].to_string(),
                line: i + 1,
                params: split_params(&caps[3]),
                docstring: python_docstring(&lines, i),
            };
            match class_indent {
                Some(ci) if indent > ci => {
                    if let Some(class) = symbols.classes.last_mut() {
                        class.methods.push(function);
                    }
                }
                _ => {
                    // Top-level def also closes any open class body.
                    if indent == 0 {
                        class_indent = None;
                    }
                    symbols.functions.push(function);
                }
            }
        }
    }

    symbols
}

fn extract_rust(text: &str) -> FileSymbols {
    let mut symbols = FileSymbols::default();
    for (i, line) in text.lines().enumerate() {
        if let Some(caps) = rs_use().captures(line) {
            symbols.imports.push(caps[1].to_string());
        } else if let Some(caps) = rs_fn().captures(line) {
            symbols.functions.push(FunctionSymbol {
                name: caps[1].to_string(),
                line: i + 1,
                params: Vec::new(),
                docstring: String::new(),
            });
        } else if let Some(caps) = rs_type().captures(line) {
            symbols.classes.push(ClassSymbol {
                name: caps[1].to_string(),
                line: i + 1,
                methods: Vec::new(),
                docstring: String::new(),
            });
        }
    }
    symbols
}

fn extract_javascript(text: &str) -> FileSymbols {
    let mut symbols = FileSymbols::default();
    for (i, line) in text.lines().enumerate() {
        if let Some(caps) = js_import().captures(line) {
            symbols.imports.push(caps[1].to_string());
        } else if let Some(caps) = js_fn().captures(line) {
            symbols.functions.push(FunctionSymbol {
                name: caps[1].to_string(),
                line: i + 1,
                params: split_params(&caps[2]),
                docstring: String::new(),
            });
        } else if let Some(caps) = js_class().captures(line) {
            symbols.classes.push(ClassSymbol {
                name: caps[1].to_string(),
                line: i + 1,
                methods: Vec::new(),
                docstring: String::new(),
            });
        }
    }
    symbols
}

fn extract_go(text: &str) -> FileSymbols {
    let mut symbols = FileSymbols::default();
    for (i, line) in text.lines().enumerate() {
        if let Some(caps) = go_import().captures(line) {
            symbols.imports.push(caps[1].to_string());
        } else if let Some(caps) = go_func().captures(line) {
            symbols.functions.push(FunctionSymbol {
                name: caps[1].to_string(),
                line: i + 1,
                params: split_params(&caps[2]),
                docstring: String::new(),
            });
        }
    }
    symbols
}

fn extract_generic(text: &str) -> FileSymbols {
    let mut symbols = FileSymbols::default();
    for (i, line) in text.lines().enumerate() {
        if let Some(caps) = generic_def().captures(line) {
            symbols.functions.push(FunctionSymbol {
                name: caps[1].to_string(),
                line: i + 1,
                params: Vec::new(),
                docstring: String::new(),
            });
        } else if let Some(caps) = java_class().captures(line) {
            symbols.classes.push(ClassSymbol {
                name: caps[1].to_string(),
                line: i + 1,
                methods: Vec::new(),
                docstring: String::new(),
            });
        }
    }
    symbols
}

#[cfg(test)]
mod tests {
    use super::*;

    const PY_SAMPLE: &str = r#"
import os
from pathlib import Path

def top_level(a, b=2):
    """Adds things."""
    return a + b

class Greeter:
    """Says hello."""

    def __init__(self, name):
        self.name = name

    def greet(self):
        return f"hi {self.name}"

def after_class():
    pass
"#;

    #[test]
    fn python_functions_classes_and_methods() {
        let symbols = extract_file_symbols("py", PY_SAMPLE);

        assert_eq!(symbols.imports, vec!["os", "pathlib.Path"]);

        let names: Vec<&str> = symbols.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["top_level", "after_class"]);
        assert_eq!(symbols.functions[0].params, vec!["a", "b"]);
        assert_eq!(symbols.functions[0].docstring, "Adds things.");

        assert_eq!(symbols.classes.len(), 1);
        let class = &symbols.classes[0];
        assert_eq!(class.name, "Greeter");
        assert_eq!(class.docstring, "Says hello.");
        let methods: Vec<&str> = class.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(methods, vec!["__init__", "greet"]);
    }

    #[test]
    fn python_line_numbers_are_one_based() {
        let symbols = extract_file_symbols("py", "def f():\n    pass\n");
        assert_eq!(symbols.functions[0].line, 1);
    }

    #[test]
    fn rust_symbols() {
        let src = "use std::fmt;\npub struct Widget;\nimpl Widget {\n}\npub async fn run() {}\nfn helper() {}\n";
        let symbols = extract_file_symbols("rs", src);
        assert_eq!(symbols.imports, vec!["std::fmt"]);
        let fns: Vec<&str> = symbols.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(fns, vec!["run", "helper"]);
        assert_eq!(symbols.classes[0].name, "Widget");
    }

    #[test]
    fn javascript_symbols() {
        let src = "import React from 'react';\nexport function App(props) {}\nclass Store {}\n";
        let symbols = extract_file_symbols("js", src);
        assert_eq!(symbols.imports, vec!["react"]);
        assert_eq!(symbols.functions[0].name, "App");
        assert_eq!(symbols.functions[0].params, vec!["props"]);
        assert_eq!(symbols.classes[0].name, "Store");
    }

    #[test]
    fn unknown_extension_yields_nothing() {
        let symbols = extract_file_symbols("css", "body { color: red; }");
        assert_eq!(symbols, FileSymbols::default());
    }

    #[test]
    fn stats_count_files_functions_classes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.py"),
            "def f():\n    pass\n\nclass C:\n    def m(self):\n        pass\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("b.js"), "function g() {}\n").unwrap();

        let table = extract_symbols(dir.path(), &FragmentingConfig::default()).unwrap();
        let stats = table.stats();
        assert_eq!(stats.total_files, 2);
        // f, m, g — methods count as functions.
        assert_eq!(stats.total_functions, 3);
        assert_eq!(stats.total_classes, 1);
        assert_eq!(stats.files_by_extension.get("py"), Some(&1));
        assert_eq!(stats.files_by_extension.get("js"), Some(&1));
    }
}
