//! Code extraction from noisy generated text.
//!
//! Generation models wrap code in prose, repeat signatures, and emit
//! half-finished fragments. Extraction runs a layered fallback, each layer
//! tried only when the previous one finds nothing:
//!
//! 1. a class definition with its full indented body
//! 2. a function definition (repeated signatures deduplicated, lines that
//!    reference known-undefined helper names skipped)
//! 3. a block opened by a code keyword and continued at deeper indentation
//! 4. any line starting with a code keyword

use std::collections::HashSet;

const CODE_KEYWORDS: &[&str] = &[
    "def", "class", "if", "for", "while", "return", "import", "from",
];

/// Helper names models invent in bodies without ever assigning them.
const UNDEFINED_HELPERS: &[&str] = &["hash_table"];

/// Pull the most plausible code block out of generated text.
pub fn extract_code(text: &str) -> Option<String> {
    let lines: Vec<&str> = text.trim().lines().map(|l| l.trim_end()).collect();

    if let Some(code) = extract_class(&lines) {
        return Some(code);
    }
    if let Some(code) = extract_function(&lines) {
        return Some(code);
    }
    if let Some(code) = extract_keyword_block(&lines) {
        return Some(code);
    }
    extract_keyword_lines(&lines)
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

fn starts_with_keyword(line: &str) -> bool {
    let trimmed = line.trim_start();
    CODE_KEYWORDS.iter().any(|kw| trimmed.starts_with(kw))
}

fn references_undefined_helper(line: &str) -> bool {
    UNDEFINED_HELPERS
        .iter()
        .any(|h| line.contains(h) && !line.contains(&format!("{} =", h)))
}

/// First class definition and every line indented under it.
fn extract_class(lines: &[&str]) -> Option<String> {
    let mut class_lines: Vec<&str> = Vec::new();
    let mut in_class = false;
    let mut class_indent = 0;

    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        if line.trim_start().starts_with("class ") {
            in_class = true;
            class_indent = indent_of(line);
            class_lines = vec![line];
        } else if in_class {
            if indent_of(line) > class_indent {
                class_lines.push(line);
            } else {
                in_class = false;
            }
        }
    }

    if class_lines.is_empty() {
        None
    } else {
        Some(class_lines.join("\n"))
    }
}

/// Function definition with repeated signatures deduplicated.
fn extract_function(lines: &[&str]) -> Option<String> {
    let mut code_lines: Vec<&str> = Vec::new();
    let mut in_function = false;
    let mut func_indent = 0;
    let mut seen_signatures: HashSet<String> = HashSet::new();

    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        if line.trim_start().starts_with("def ") {
            let signature = line.trim().split('(').next().unwrap_or("").to_string();
            if seen_signatures.contains(&signature) {
                in_function = false;
                continue;
            }
            seen_signatures.insert(signature);
            in_function = true;
            func_indent = indent_of(line);
            code_lines = vec![line];
        } else if in_function {
            if indent_of(line) > func_indent {
                if references_undefined_helper(line) {
                    continue;
                }
                code_lines.push(line);
            } else {
                in_function = false;
            }
        }
    }

    if code_lines.is_empty() {
        None
    } else {
        Some(code_lines.join("\n"))
    }
}

/// Keyword-opened block continued at deeper indentation.
fn extract_keyword_block(lines: &[&str]) -> Option<String> {
    let mut block: Vec<&str> = Vec::new();
    let mut in_block = false;
    let mut block_indent = 0;

    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        if starts_with_keyword(line) {
            in_block = true;
            block_indent = indent_of(line);
            block.push(line);
        } else if in_block && indent_of(line) > block_indent {
            block.push(line);
        } else {
            in_block = false;
        }
    }

    if block.is_empty() {
        None
    } else {
        Some(block.join("\n"))
    }
}

/// Last resort: every keyword-opened line on its own.
fn extract_keyword_lines(lines: &[&str]) -> Option<String> {
    let code_lines: Vec<&str> = lines
        .iter()
        .filter(|l| starts_with_keyword(l) && !references_undefined_helper(l))
        .copied()
        .collect();

    if code_lines.is_empty() {
        None
    } else {
        Some(code_lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_definition_wins_over_function() {
        let text = "\
Here is the solution:
def helper():
    pass
class Solution:
    def solve(self, nums):
        return max(nums)
That should work.";
        let code = extract_code(text).unwrap();
        assert!(code.starts_with("class Solution:"));
        assert!(code.contains("def solve(self, nums):"));
        assert!(!code.contains("Here is the solution"));
    }

    #[test]
    fn function_body_is_extracted_with_indentation() {
        let text = "\
Sure! The function below solves it.
def solve(nums):
    best = nums[0]
    return best
Hope this helps.";
        let code = extract_code(text).unwrap();
        assert_eq!(code, "def solve(nums):\n    best = nums[0]\n    return best");
    }

    #[test]
    fn repeated_signatures_are_deduplicated() {
        let text = "\
def solve(nums):
    return nums[0]
def solve(nums):
    return nums[1]";
        let code = extract_code(text).unwrap();
        // The second occurrence of the same signature is skipped.
        assert_eq!(code.matches("def solve").count(), 1);
    }

    #[test]
    fn undefined_helper_lines_are_skipped() {
        let text = "\
def solve(nums):
    hash_table[nums] = 1
    return nums";
        let code = extract_code(text).unwrap();
        assert!(!code.contains("hash_table"));
        assert!(code.contains("return nums"));
    }

    #[test]
    fn keyword_block_fallback_picks_up_loose_code() {
        let text = "\
The answer is computed iteratively.
for i in items:
    total += i
And that is all.";
        let code = extract_code(text).unwrap();
        assert_eq!(code, "for i in items:\n    total += i");
    }

    #[test]
    fn prose_only_text_yields_nothing() {
        assert!(extract_code("I am sorry, I cannot help with that.").is_none());
    }

    #[test]
    fn empty_text_yields_nothing() {
        assert!(extract_code("").is_none());
        assert!(extract_code("\n\n  \n").is_none());
    }
}
