//! Language signature catalogue for code block detection
//!
//! Each signature pairs bare keywords (matched on word boundaries) with
//! syntax regexes. Detection sums the hit counts of both lists. Catalogue
//! order breaks ties, so more common languages come first.

use regex::Regex;
use std::sync::LazyLock;

/// Keywords and syntax shapes that identify one language
pub struct LanguageSignature {
    pub name: &'static str,
    pub keywords: &'static [&'static str],
    pub syntax: &'static [&'static str],
}

pub static PYTHON: LanguageSignature = LanguageSignature {
    name: "python",
    keywords: &["def", "elif", "pass", "lambda", "self", "None", "True", "False", "async def"],
    syntax: &[
        r"(?m)^\s*def\s+\w+\s*\(.*\)\s*(->\s*[\w\[\], ]+)?:",
        r"(?m)^\s*(from\s+[\w.]+\s+)?import\s+[\w.]+",
        r"(?m)^\s*class\s+\w+(\(.*\))?\s*:",
        r#"(?m)^\s*if\s+__name__\s*==\s*["']__main__["']"#,
        r"\bprint\(",
        r"(?m)^\s*@\w+",
    ],
};

pub static JAVASCRIPT: LanguageSignature = LanguageSignature {
    name: "javascript",
    keywords: &["function", "const", "var", "undefined", "typeof", "require"],
    syntax: &[
        r"\bconsole\.log\(",
        r"=>\s*\{?",
        r"\bdocument\.\w+",
        r"\bmodule\.exports\b",
        r"(?m)^\s*export\s+(default\s+)?(function|const|class)",
        r"===|!==",
    ],
};

pub static TYPESCRIPT: LanguageSignature = LanguageSignature {
    name: "typescript",
    keywords: &["interface", "readonly", "namespace", "implements"],
    syntax: &[
        r":\s*(string|number|boolean|void|any|unknown)\b",
        r"\btype\s+\w+\s*=",
        r"\binterface\s+\w+\s*\{",
        r"<\w+>\(",
    ],
};

pub static RUST: LanguageSignature = LanguageSignature {
    name: "rust",
    keywords: &["fn", "impl", "pub", "mut", "crate", "trait", "match"],
    syntax: &[
        r"\blet\s+mut\s",
        r"\w+!\(",
        r"->\s*(Self|Result|Option|\w+)",
        r"#\[\w+",
        r"::\w+",
        r"&'?\w*\s*self",
    ],
};

pub static GO: LanguageSignature = LanguageSignature {
    name: "go",
    keywords: &["func", "package", "chan", "defer", "go"],
    syntax: &[
        r":=",
        r"\bfmt\.\w+\(",
        r"(?m)^package\s+\w+",
        r"\bfunc\s+(\(\w+\s+\*?\w+\)\s*)?\w+\(",
    ],
};

pub static JAVA: LanguageSignature = LanguageSignature {
    name: "java",
    keywords: &["public", "private", "protected", "static", "void", "extends", "final"],
    syntax: &[
        r"\bSystem\.out\.print",
        r"\bpublic\s+(static\s+)?class\s+\w+",
        r"\bpublic\s+static\s+void\s+main",
        r"@Override",
        r"\bnew\s+\w+(<.*>)?\(",
    ],
};

pub static CSHARP: LanguageSignature = LanguageSignature {
    name: "csharp",
    keywords: &["using", "namespace", "var", "async", "await"],
    syntax: &[
        r"\bConsole\.Write(Line)?\(",
        r"(?m)^\s*using\s+System",
        r"\{\s*get;\s*set;\s*\}",
    ],
};

pub static C: LanguageSignature = LanguageSignature {
    name: "c",
    keywords: &["int", "char", "struct", "typedef", "sizeof", "unsigned"],
    syntax: &[
        r"(?m)^\s*#include\s*<\w+\.h>",
        r"\bprintf\(",
        r"\bmalloc\(",
        r"(?m)^\s*int\s+main\s*\(",
    ],
};

pub static CPP: LanguageSignature = LanguageSignature {
    name: "cpp",
    keywords: &["template", "typename", "namespace", "nullptr", "virtual"],
    syntax: &[
        r"\bstd::\w+",
        r"(?m)^\s*#include\s*<\w+>",
        r"\bcout\s*<<",
        r"\w+::\w+\(",
    ],
};

pub static RUBY: LanguageSignature = LanguageSignature {
    name: "ruby",
    keywords: &["def", "end", "elsif", "unless", "puts", "nil", "require"],
    syntax: &[
        r"(?m)^\s*end\s*$",
        r"\bdo\s*\|\w+(,\s*\w+)*\|",
        r"(?m)^\s*attr_(accessor|reader|writer)\b",
        r":\w+\s*=>",
    ],
};

pub static PHP: LanguageSignature = LanguageSignature {
    name: "php",
    keywords: &["echo", "foreach", "namespace"],
    syntax: &[r"<\?php", r"\$\w+\s*=", r"->\w+\(", r"\$this->"],
};

pub static BASH: LanguageSignature = LanguageSignature {
    name: "bash",
    keywords: &["fi", "esac", "done", "echo", "export", "sudo"],
    syntax: &[
        r"^#!/(usr/)?bin/(env\s+)?(ba)?sh",
        r"(?m)^\s*\$\s+\w+",
        r"(?m)^\s*(apt|apt-get|brew|npm|cargo|pip|git|curl|docker)\s+\w+",
        r"\$\{?\w+\}?",
        r"\s\|\s*(grep|awk|sed|xargs)\b",
    ],
};

pub static SQL: LanguageSignature = LanguageSignature {
    name: "sql",
    keywords: &["SELECT", "FROM", "WHERE", "INSERT", "UPDATE", "DELETE", "JOIN", "CREATE"],
    syntax: &[
        r"(?i)\bselect\s+.+\s+from\s+\w+",
        r"(?i)\binsert\s+into\s+\w+",
        r"(?i)\bcreate\s+table\s+\w+",
        r"(?i)\bgroup\s+by\b",
    ],
};

pub static HTML: LanguageSignature = LanguageSignature {
    name: "html",
    keywords: &[],
    syntax: &[
        r"(?i)<!doctype\s+html",
        r"(?i)</?(div|span|html|body|head|p|a|ul|li)\b[^>]*>",
        r#"\s(class|href|src)="[^"]*""#,
    ],
};

pub static CSS: LanguageSignature = LanguageSignature {
    name: "css",
    keywords: &[],
    syntax: &[
        r"(?m)^\s*[.#]?[\w-]+(\s*[,>+~]?\s*[.#]?[\w-]+)*\s*\{",
        r"(?m)^\s*[\w-]+\s*:\s*[^;{]+;\s*$",
        r"@media\b",
    ],
};

pub static JSON: LanguageSignature = LanguageSignature {
    name: "json",
    keywords: &[],
    syntax: &[r#"^\s*[\{\[]"#, r#""\w+"\s*:\s*"#],
};

pub static YAML: LanguageSignature = LanguageSignature {
    name: "yaml",
    keywords: &[],
    syntax: &[r"(?m)^---\s*$", r"(?m)^\s*[\w-]+:\s+[^{};]+$", r"(?m)^\s*-\s+[\w-]+:"],
};

/// Catalogue order breaks ties.
pub static ALL_LANGUAGES: &[&LanguageSignature] = &[
    &PYTHON,
    &JAVASCRIPT,
    &TYPESCRIPT,
    &RUST,
    &GO,
    &JAVA,
    &CSHARP,
    &C,
    &CPP,
    &RUBY,
    &PHP,
    &BASH,
    &SQL,
    &HTML,
    &CSS,
    &JSON,
    &YAML,
];

/// A signature with its patterns compiled
pub struct CompiledSignature {
    pub name: &'static str,
    patterns: Vec<Regex>,
}

impl CompiledSignature {
    fn compile(signature: &LanguageSignature) -> Self {
        let keywords = signature.keywords.iter().map(|kw| {
            Regex::new(&format!(r"\b{}\b", regex::escape(kw)))
                .expect("BUG: hardcoded language keyword is an invalid regex")
        });
        let syntax = signature.syntax.iter().map(|pattern| {
            Regex::new(pattern).expect("BUG: hardcoded language syntax pattern is invalid")
        });
        Self {
            name: signature.name,
            patterns: keywords.chain(syntax).collect(),
        }
    }

    /// Total number of keyword and syntax hits in `code`
    #[must_use]
    pub fn hits(&self, code: &str) -> usize {
        self.patterns.iter().map(|re| re.find_iter(code).count()).sum()
    }
}

pub static COMPILED_LANGUAGES: LazyLock<Vec<CompiledSignature>> = LazyLock::new(|| {
    ALL_LANGUAGES
        .iter()
        .map(|signature| CompiledSignature::compile(signature))
        .collect()
});

/// Every language name the catalogue knows, used to accept bare class hints
#[must_use]
pub fn is_known_language(name: &str) -> bool {
    ALL_LANGUAGES.iter().any(|sig| sig.name == name)
        || matches!(
            name,
            "typescript" | "kotlin" | "swift" | "scala" | "haskell" | "lua" | "perl" | "r"
                | "toml" | "xml" | "markdown" | "dockerfile" | "makefile" | "latex" | "diff"
                | "powershell" | "shell" | "sh" | "zsh" | "plaintext" | "text"
        )
}
