//! Code Assembler
//!
//! Sanitizes agent-authored source, checks structural well-formedness, and
//! emits the three sandbox files: `index.<ext>` (typed stubs),
//! `runtime.<ext>` (the RPC runtime), and `main.<ext>` (the entry point
//! wrapping the agent's code).
//!
//! Sanitization is purely syntactic string rewriting over a small
//! string-literal-aware scanner; it never attempts to parse the source as
//! a program. Nothing here trusts the agent's text -- the structural
//! brace check exists only because the downstream transpiler's positional
//! diagnostics are a poor self-repair signal for models.

use crate::catalog::Catalog;
use crate::config::SandboxLanguage;
use crate::error::PtcError;

pub struct AssembledFiles {
    pub index: String,
    pub runtime: String,
    pub main: String,
    pub ext: &'static str,
}

/// Tracks whether a byte offset in the source sits inside a string literal,
/// honoring `"`, `'`, and `` ` `` with backslash escapes. Used by both the
/// sanitizer and the brace balance check so they agree on what counts as
/// "outside strings".
struct StringScanner {
    in_string: Option<char>,
    escaped: bool,
}

impl StringScanner {
    fn new() -> Self {
        Self { in_string: None, escaped: false }
    }

    /// Feed one character; returns whether this character itself is inside
    /// a string literal (the opening/closing quote counts as "in string").
    fn feed(&mut self, c: char) -> bool {
        if let Some(quote) = self.in_string {
            let was_in_string = true;
            if self.escaped {
                self.escaped = false;
            } else if c == '\\' {
                self.escaped = true;
            } else if c == quote {
                self.in_string = None;
            }
            was_in_string
        } else {
            match c {
                '"' | '\'' | '`' => {
                    self.in_string = Some(c);
                    true
                }
                _ => false,
            }
        }
    }
}

/// Remove constructs the agent commonly emits that break the wrapper:
/// top-level `import ... from "...";` statements, and a surrounding
/// `async function main() { ... }` plus matching `export default main();`.
pub fn sanitize_source(source: &str) -> String {
    let without_imports = strip_imports(source);
    strip_main_wrapper(&without_imports)
}

fn strip_imports(source: &str) -> String {
    let chars: Vec<char> = source.chars().collect();
    let mut in_string = StringScanner::new();
    let string_flags: Vec<bool> = chars.iter().map(|&c| in_string.feed(c)).collect();

    let mut out = String::with_capacity(source.len());
    let mut i = 0;
    while i < chars.len() {
        if !string_flags[i] && matches_keyword_at(&chars, i, "import") {
            // Scan forward to the next top-level ';' (outside strings) or
            // end of line, respecting string state as we go.
            let mut j = i;
            let mut scanner = StringScanner::new();
            // Re-derive string state from this point forward; imports are
            // never themselves inside a string (checked above), so a fresh
            // scanner starting clean is correct here.
            let mut end = chars.len();
            while j < chars.len() {
                let was_in_string = scanner.feed(chars[j]);
                if !was_in_string && chars[j] == ';' {
                    end = j + 1;
                    break;
                }
                if !was_in_string && chars[j] == '\n' && j > i {
                    end = j;
                    break;
                }
                j += 1;
            }
            i = end;
            // Consume a single trailing newline so we don't leave a blank
            // line where the import used to be.
            if i < chars.len() && chars[i] == '\n' {
                i += 1;
            }
            continue;
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

fn matches_keyword_at(chars: &[char], pos: usize, keyword: &str) -> bool {
    let kw: Vec<char> = keyword.chars().collect();
    if pos + kw.len() > chars.len() {
        return false;
    }
    if chars[pos..pos + kw.len()] != kw[..] {
        return false;
    }
    let boundary_before = pos == 0 || !is_ident_char(chars[pos - 1]);
    let boundary_after = pos + kw.len() == chars.len() || !is_ident_char(chars[pos + kw.len()]);
    boundary_before && boundary_after
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn strip_main_wrapper(source: &str) -> String {
    let chars: Vec<char> = source.chars().collect();
    let mut scanner = StringScanner::new();
    let string_flags: Vec<bool> = chars.iter().map(|&c| scanner.feed(c)).collect();

    let Some((sig_start, body_start)) = find_main_signature(&chars, &string_flags) else {
        return source.to_string();
    };
    let Some(body_end) = find_matching_brace(&chars, &string_flags, body_start) else {
        return source.to_string();
    };

    let inner_body: String = chars[body_start + 1..body_end].iter().collect();
    let before: String = chars[..sig_start].iter().collect();
    let mut after: String = chars[body_end + 1..].iter().collect();
    after = strip_export_default_main(&after);

    format!("{before}{}{after}", inner_body.trim_matches('\n'))
}

/// Find `(async )?function main ( )  {` outside any string; returns the
/// start of the whole signature and the index of its opening `{`.
fn find_main_signature(chars: &[char], string_flags: &[bool]) -> Option<(usize, usize)> {
    let mut i = 0;
    while i < chars.len() {
        if !string_flags[i] && matches_keyword_at(chars, i, "function") {
            let sig_start = rewind_async(chars, string_flags, i);
            let mut j = i + "function".len();
            j = skip_whitespace(chars, j);
            if !matches_keyword_at(chars, j, "main") {
                i += 1;
                continue;
            }
            j += "main".len();
            j = skip_whitespace(chars, j);
            if chars.get(j) != Some(&'(') {
                i += 1;
                continue;
            }
            j += 1;
            j = skip_whitespace(chars, j);
            if chars.get(j) != Some(&')') {
                i += 1;
                continue;
            }
            j += 1;
            j = skip_whitespace(chars, j);
            if chars.get(j) != Some(&'{') {
                i += 1;
                continue;
            }
            return Some((sig_start, j));
        }
        i += 1;
    }
    None
}

fn rewind_async(chars: &[char], string_flags: &[bool], function_pos: usize) -> usize {
    let before_ws_end = function_pos;
    let mut k = before_ws_end;
    while k > 0 && chars[k - 1].is_whitespace() {
        k -= 1;
    }
    let kw = "async";
    if k >= kw.len() {
        let start = k - kw.len();
        if !string_flags[start] && matches_keyword_at(chars, start, kw) {
            return start;
        }
    }
    function_pos
}

fn skip_whitespace(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    i
}

fn find_matching_brace(chars: &[char], string_flags: &[bool], open_pos: usize) -> Option<usize> {
    let mut depth = 0i64;
    for (i, &c) in chars.iter().enumerate().skip(open_pos) {
        if string_flags[i] {
            continue;
        }
        if c == '{' {
            depth += 1;
        } else if c == '}' {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

fn strip_export_default_main(source: &str) -> String {
    let chars: Vec<char> = source.chars().collect();
    let mut scanner = StringScanner::new();
    let string_flags: Vec<bool> = chars.iter().map(|&c| scanner.feed(c)).collect();

    let mut i = 0;
    while i < chars.len() {
        if !string_flags[i] && matches_keyword_at(&chars, i, "export") {
            let mut j = skip_whitespace(&chars, i + "export".len());
            if !matches_keyword_at(&chars, j, "default") {
                i += 1;
                continue;
            }
            j = skip_whitespace(&chars, j + "default".len());
            if !matches_keyword_at(&chars, j, "main") {
                i += 1;
                continue;
            }
            j = skip_whitespace(&chars, j + "main".len());
            if chars.get(j) != Some(&'(') {
                i += 1;
                continue;
            }
            j += 1;
            j = skip_whitespace(&chars, j);
            if chars.get(j) != Some(&')') {
                i += 1;
                continue;
            }
            j += 1;
            j = skip_whitespace(&chars, j);
            if chars.get(j) == Some(&';') {
                j += 1;
            }
            let before: String = chars[..i].iter().collect();
            let after: String = chars[j..].iter().collect();
            return format!("{before}{after}");
        }
        i += 1;
    }
    source.to_string()
}

/// Count `{`/`}` outside strings; fail with a precise message naming which
/// side is missing and by how much.
pub fn check_balanced_braces(source: &str) -> Result<(), PtcError> {
    let mut scanner = StringScanner::new();
    let mut open = 0usize;
    let mut close = 0usize;
    for c in source.chars() {
        let in_string = scanner.feed(c);
        if in_string {
            continue;
        }
        match c {
            '{' => open += 1,
            '}' => close += 1,
            _ => {}
        }
    }
    if open == close {
        Ok(())
    } else {
        Err(PtcError::UnbalancedBraces { open, close })
    }
}

pub fn assemble(
    source: &str,
    catalog: &Catalog,
    language: SandboxLanguage,
    nonce: &str,
    poll_timeout_ms: u64,
) -> Result<AssembledFiles, PtcError> {
    let sanitized = sanitize_source(source);
    check_balanced_braces(&sanitized)?;

    let ext = language.ext();
    Ok(AssembledFiles {
        index: emit_index(catalog, language),
        runtime: emit_runtime(language, nonce, poll_timeout_ms),
        main: emit_main(&sanitized, catalog, language, nonce),
        ext,
    })
}

fn emit_index(catalog: &Catalog, language: SandboxLanguage) -> String {
    let ext = language.ext();
    let mut out = format!("import {{ callTool }} from \"./runtime.{ext}\";\n\n");
    for tool in catalog.list() {
        let output_type = tool.output_schema.as_ref().map(|s| s.project()).unwrap_or_else(|| "any".to_string());
        match language {
            SandboxLanguage::TypeScript => {
                let input_type = tool.input_schema.project();
                out.push_str(&format!(
                    "export async function {}(input: {input_type}): Promise<{output_type}> {{\n  return callTool(\"{}\", input) as Promise<{output_type}>;\n}}\n\n",
                    tool.name, tool.name
                ));
            }
            SandboxLanguage::JavaScript => {
                out.push_str(&format!(
                    "export async function {}(input) {{\n  return callTool(\"{}\", input);\n}}\n\n",
                    tool.name, tool.name
                ));
            }
        }
    }
    out
}

fn emit_runtime(language: SandboxLanguage, nonce: &str, poll_timeout_ms: u64) -> String {
    let type_annotations = matches!(language, SandboxLanguage::TypeScript);
    let (args_type, ret_type, sig_suffix) = if type_annotations {
        (": any", ": Promise<any>", "")
    } else {
        ("", "", "")
    };
    let _ = sig_suffix;

    format!(
        r#"// Generated in-sandbox RPC runtime. Strictly serial per request:
// canonicalize -> check cache -> write request -> print sentinel -> poll
// for response -> resume.
import {{ createHash }} from "node:crypto";
import {{ readFile, writeFile, unlink }} from "node:fs/promises";
import {{ existsSync }} from "node:fs";

const NONCE = {nonce:?};
const CACHE_PATH = "cache.json";
const POLL_START_MS = 10;
const POLL_MULTIPLIER = 1.5;
const POLL_CAP_MS = 1000;
const POLL_BUDGET_MS = {poll_timeout_ms};

function canonicalJson(value{args_type}){ret_type_unused} {{
  if (value === null || typeof value !== "object") {{
    return JSON.stringify(value);
  }}
  if (Array.isArray(value)) {{
    return "[" + value.map(canonicalJson).join(",") + "]";
  }}
  const keys = Object.keys(value).sort();
  return "{{" + keys.map((k) => JSON.stringify(k) + ":" + canonicalJson(value[k])).join(",") + "}}";
}}

function cacheKey(tool, args) {{
  return createHash("sha256").update(tool + ":" + canonicalJson(args)).digest("hex");
}}

async function readCache() {{
  if (!existsSync(CACHE_PATH)) return {{}};
  try {{
    const text = await readFile(CACHE_PATH, "utf-8");
    return JSON.parse(text);
  }} catch {{
    return {{}};
  }}
}}

async function writeCacheEntry(key, result) {{
  const cache = await readCache();
  cache[key] = result;
  await writeFile(CACHE_PATH, JSON.stringify(cache));
}}

function freshRequestId() {{
  return `${{Date.now().toString(36)}}-${{Math.random().toString(36).slice(2)}}`;
}}

function sleep(ms{args_type}){ret_type_unused} {{
  return new Promise((resolve) => setTimeout(resolve, ms));
}}

export async function callTool(tool{args_type}, args{args_type}){ret_type} {{
  const key = cacheKey(tool, args);
  const cache = await readCache();
  if (Object.prototype.hasOwnProperty.call(cache, key)) {{
    return cache[key];
  }}

  const requestId = freshRequestId();
  const requestPath = `requests/${{requestId}}.json`;
  const responsePath = `responses/${{requestId}}.json`;

  await writeFile(requestPath, JSON.stringify({{ requestId, tool, args, cacheKey: key }}));
  console.log(`${{NONCE}}__PTC_TOOL_REQUEST__${{requestId}}`);

  let waited = 0;
  let delay = POLL_START_MS;
  while (waited < POLL_BUDGET_MS) {{
    if (existsSync(responsePath)) {{
      let response;
      try {{
        const text = await readFile(responsePath, "utf-8");
        response = JSON.parse(text);
      }} catch {{
        await sleep(delay);
        waited += delay;
        delay = Math.min(delay * POLL_MULTIPLIER, POLL_CAP_MS);
        continue;
      }}

      if (response.success === false) {{
        await unlink(requestPath).catch(() => {{}});
        await unlink(responsePath).catch(() => {{}});
        throw new Error(`Tool call error: ${{response.error}}`);
      }}

      await writeCacheEntry(key, response.result);
      await unlink(requestPath).catch(() => {{}});
      await unlink(responsePath).catch(() => {{}});
      return response.result;
    }}
    await sleep(delay);
    waited += delay;
    delay = Math.min(delay * POLL_MULTIPLIER, POLL_CAP_MS);
  }}

  await unlink(requestPath).catch(() => {{}});
  throw new Error("Tool request timeout");
}}
"#,
        nonce = nonce,
        args_type = args_type,
        ret_type = ret_type,
        ret_type_unused = "",
        poll_timeout_ms = poll_timeout_ms,
    )
}

fn emit_main(sanitized_body: &str, catalog: &Catalog, language: SandboxLanguage, nonce: &str) -> String {
    let ext = language.ext();
    let names: Vec<&str> = catalog.list().iter().map(|t| t.name.as_str()).collect();
    let import_line = if names.is_empty() {
        String::new()
    } else {
        format!("import {{ {} }} from \"./index.{ext}\";\n", names.join(", "))
    };

    format!(
        r#"{import_line}
const NONCE = {nonce:?};

function classifyError(err) {{
  const message = err && err.message ? err.message : String(err);
  if (message.startsWith("Tool call error:")) return message;
  if (message === "Tool request timeout") return message;
  return `Runtime error: ${{message}}`;
}}

(async () => {{
  try {{
    const result = await (async () => {{
{sanitized_body}
    }})();

    let json;
    try {{
      json = JSON.stringify(result === undefined ? null : result);
    }} catch (e) {{
      throw new Error(`circular: result could not be serialized to JSON (${{e}})`);
    }}

    console.log(`${{NONCE}}__PTC_FINAL__${{json}}`);
  }} catch (err) {{
    const message = classifyError(err);
    console.log(`${{NONCE}}__PTC_ERROR__${{JSON.stringify({{ message }})}}`);
    process.exitCode = 1;
  }}
}})();
"#,
        import_line = import_line,
        nonce = nonce,
        sanitized_body = indent(sanitized_body, "      "),
    )
}

fn indent(text: &str, prefix: &str) -> String {
    text.lines().map(|line| format!("{prefix}{line}")).collect::<Vec<_>>().join("\n")
}
