//! MathML to LaTeX conversion
//!
//! Table driven: layout elements map to LaTeX constructs and token characters
//! (Greek letters, operators) map to LaTeX commands. A TeX annotation, as
//! emitted by KaTeX and MathJax, is used verbatim when present.

use crate::dom::{Element, Node};

const TEX_ENCODINGS: &[&str] = &["application/x-tex", "text/x-tex", "application/x-latex"];

const NAMED_FUNCTIONS: &[&str] = &[
    "sin", "cos", "tan", "cot", "sec", "csc", "arcsin", "arccos", "arctan", "sinh", "cosh", "tanh",
    "log", "ln", "lg", "exp", "lim", "max", "min", "sup", "inf", "det", "gcd", "deg", "dim", "ker",
];

/// LaTeX command for a single token character
fn char_command(ch: char) -> Option<&'static str> {
    Some(match ch {
        'α' => r"\alpha",
        'β' => r"\beta",
        'γ' => r"\gamma",
        'δ' => r"\delta",
        'ε' | 'ϵ' => r"\epsilon",
        'ζ' => r"\zeta",
        'η' => r"\eta",
        'θ' => r"\theta",
        'ι' => r"\iota",
        'κ' => r"\kappa",
        'λ' => r"\lambda",
        'μ' => r"\mu",
        'ν' => r"\nu",
        'ξ' => r"\xi",
        'π' => r"\pi",
        'ρ' => r"\rho",
        'σ' => r"\sigma",
        'τ' => r"\tau",
        'υ' => r"\upsilon",
        'φ' | 'ϕ' => r"\phi",
        'χ' => r"\chi",
        'ψ' => r"\psi",
        'ω' => r"\omega",
        'Γ' => r"\Gamma",
        'Δ' => r"\Delta",
        'Θ' => r"\Theta",
        'Λ' => r"\Lambda",
        'Ξ' => r"\Xi",
        'Π' => r"\Pi",
        'Σ' => r"\Sigma",
        'Φ' => r"\Phi",
        'Ψ' => r"\Psi",
        'Ω' => r"\Omega",
        '±' => r"\pm",
        '∓' => r"\mp",
        '×' => r"\times",
        '÷' => r"\div",
        '·' | '⋅' => r"\cdot",
        '∗' => "*",
        '−' => "-",
        '≤' => r"\leq",
        '≥' => r"\geq",
        '≠' => r"\neq",
        '≈' => r"\approx",
        '≡' => r"\equiv",
        '∼' => r"\sim",
        '∝' => r"\propto",
        '∞' => r"\infty",
        '∑' => r"\sum",
        '∏' => r"\prod",
        '∫' => r"\int",
        '∮' => r"\oint",
        '∂' => r"\partial",
        '∇' => r"\nabla",
        '√' => r"\surd",
        '→' => r"\to",
        '←' => r"\leftarrow",
        '↔' => r"\leftrightarrow",
        '⇒' => r"\Rightarrow",
        '⇐' => r"\Leftarrow",
        '⇔' => r"\Leftrightarrow",
        '↦' => r"\mapsto",
        '∈' => r"\in",
        '∉' => r"\notin",
        '∋' => r"\ni",
        '⊂' => r"\subset",
        '⊃' => r"\supset",
        '⊆' => r"\subseteq",
        '⊇' => r"\supseteq",
        '∪' => r"\cup",
        '∩' => r"\cap",
        '∅' => r"\emptyset",
        '∀' => r"\forall",
        '∃' => r"\exists",
        '¬' => r"\neg",
        '∧' => r"\land",
        '∨' => r"\lor",
        '…' => r"\ldots",
        '⋯' => r"\cdots",
        '∘' => r"\circ",
        '′' => "'",
        '″' => "''",
        '⟨' => r"\langle",
        '⟩' => r"\rangle",
        'ℝ' => r"\mathbb{R}",
        'ℕ' => r"\mathbb{N}",
        'ℤ' => r"\mathbb{Z}",
        'ℚ' => r"\mathbb{Q}",
        'ℂ' => r"\mathbb{C}",
        // Invisible function application, times and separator
        '\u{2061}' | '\u{2062}' | '\u{2063}' => "",
        _ => return None,
    })
}

/// Map token text character by character, keeping unknown characters as-is.
fn map_token(text: &str) -> String {
    let trimmed = text.trim();
    if NAMED_FUNCTIONS.contains(&trimmed) {
        return format!(r"\{trimmed}");
    }
    let mut parts: Vec<String> = Vec::new();
    for ch in trimmed.chars() {
        match char_command(ch) {
            Some(cmd) => parts.push(cmd.to_string()),
            None if ch == '{' || ch == '}' => parts.push(format!(r"\{ch}")),
            None => parts.push(ch.to_string()),
        }
    }
    join_latex(&parts)
}

/// Concatenate LaTeX pieces, spacing a command from a following letter.
fn join_latex(parts: &[String]) -> String {
    let mut out = String::new();
    for part in parts.iter().filter(|p| !p.is_empty()) {
        if ends_with_command(&out) && part.starts_with(|c: char| c.is_ascii_alphabetic()) {
            out.push(' ');
        }
        out.push_str(part);
    }
    out
}

fn ends_with_command(text: &str) -> bool {
    let tail: String = text
        .chars()
        .rev()
        .take_while(char::is_ascii_alphabetic)
        .collect();
    !tail.is_empty() && text[..text.len() - tail.len()].ends_with('\\')
}

/// Wrap in braces unless it is a single character or a bare command
fn group(latex: &str) -> String {
    let is_atom = latex.chars().count() == 1
        || (latex.starts_with('\\') && latex[1..].chars().all(|c| c.is_ascii_alphabetic()));
    if is_atom && !latex.is_empty() {
        latex.to_string()
    } else {
        format!("{{{latex}}}")
    }
}

/// TeX source carried in an `<annotation>`, if any
#[must_use]
pub fn tex_annotation(math: &Element) -> Option<String> {
    math.find_first(&|el| {
        el.is("annotation")
            && el
                .attr("encoding")
                .is_some_and(|enc| TEX_ENCODINGS.iter().any(|t| enc.trim().eq_ignore_ascii_case(t)))
    })
    .map(|annotation| annotation.text_content().trim().to_string())
    .filter(|tex| !tex.is_empty())
}

/// Convert a `<math>` element (or any MathML subtree) to LaTeX text.
#[must_use]
pub fn mathml_to_latex(math: &Element) -> String {
    if let Some(tex) = tex_annotation(math) {
        return tex;
    }
    convert(math).trim().to_string()
}

fn children_latex(el: &Element) -> Vec<String> {
    el.children
        .iter()
        .filter_map(|child| match child {
            Node::Element(child) => Some(convert(child)),
            Node::Text(text) if !text.trim().is_empty() => Some(map_token(text)),
            _ => None,
        })
        .collect()
}

fn nth_child(el: &Element, n: usize) -> String {
    el.child_elements().nth(n).map(convert).unwrap_or_default()
}

fn convert(el: &Element) -> String {
    match el.tag.as_str() {
        "mi" | "mn" | "mo" => map_token(&el.text_content()),
        "mtext" => {
            let text = el.text_content();
            let text = text.trim();
            if text.is_empty() {
                String::new()
            } else {
                format!(r"\text{{{text}}}")
            }
        }
        "mspace" => r"\,".to_string(),
        "mfrac" => format!(r"\frac{{{}}}{{{}}}", nth_child(el, 0), nth_child(el, 1)),
        "msqrt" => format!(r"\sqrt{{{}}}", join_latex(&children_latex(el))),
        "mroot" => format!(r"\sqrt[{}]{{{}}}", nth_child(el, 1), nth_child(el, 0)),
        "msup" | "mover" => format!("{}^{{{}}}", group(&nth_child(el, 0)), nth_child(el, 1)),
        "msub" | "munder" => format!("{}_{{{}}}", group(&nth_child(el, 0)), nth_child(el, 1)),
        "msubsup" | "munderover" => format!(
            "{}_{{{}}}^{{{}}}",
            group(&nth_child(el, 0)),
            nth_child(el, 1),
            nth_child(el, 2)
        ),
        "mfenced" => {
            let open = el.attr("open").unwrap_or("(");
            let close = el.attr("close").unwrap_or(")");
            let separator = el.attr("separators").unwrap_or(",");
            format!(
                r"\left{}{}\right{}",
                map_token(open),
                children_latex(el).join(separator),
                map_token(close)
            )
        }
        "mtable" => {
            let rows: Vec<String> = el
                .child_elements()
                .filter(|row| row.is("mtr") || row.is("mlabeledtr"))
                .map(|row| {
                    row.child_elements()
                        .filter(|cell| cell.is("mtd"))
                        .map(|cell| join_latex(&children_latex(cell)))
                        .collect::<Vec<_>>()
                        .join(" & ")
                })
                .collect();
            format!(r"\begin{{matrix}} {} \end{{matrix}}", rows.join(r" \\ "))
        }
        // Presentation markup is the first child; annotations are handled up front.
        "semantics" => el.child_elements().next().map(convert).unwrap_or_default(),
        "annotation" | "annotation-xml" | "none" | "mprescripts" => String::new(),
        _ => join_latex(&children_latex(el)),
    }
}
