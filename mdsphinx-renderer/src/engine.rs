//! Tera template expansion for a single source file.
//!
//! Every source gets its own one-off [`Tera`] instance so the `mermaid`
//! function can write images next to that file. Autoescaping is off: the
//! outputs are markdown and reStructuredText, not HTML.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Deserialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tera::ast::{Expr, ExprVal, LogicOperator, Node};
use tera::Tera;

use mdsphinx_core::ProcessRunner;

use crate::context::RenderContext;
use crate::diagram::{render_diagram, DiagramInput, DiagramOptions};
use crate::error::{DiagramError, RenderError};

// ---------------------------------------------------------------------------
// TemplateEngine
// ---------------------------------------------------------------------------

/// Expands template sources against a [`RenderContext`].
#[derive(Clone)]
pub struct TemplateEngine {
    runner: Arc<dyn ProcessRunner>,
}

impl TemplateEngine {
    /// `runner` is used by the `mermaid` template function.
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self { runner }
    }

    /// Render `content` read from `source`, whose output will be written to
    /// `out_path`. Diagrams land in the parent of `out_path`.
    pub fn render(
        &self,
        source: &Path,
        content: &str,
        out_path: &Path,
        ctx: &RenderContext,
    ) -> Result<String, RenderError> {
        let name = source.display().to_string();
        let template_err = |source: tera::Error| RenderError::Template {
            path: PathBuf::from(&name),
            source,
        };

        let failure = Arc::new(Mutex::new(None));
        let mermaid = MermaidFunction {
            runner: Arc::clone(&self.runner),
            src_dir: source.parent().map(Path::to_path_buf).unwrap_or_default(),
            out_dir: out_path.parent().map(Path::to_path_buf).unwrap_or_default(),
            failure: Arc::clone(&failure),
        };

        let mut tera = Tera::default();
        tera.autoescape_on(vec![]);
        tera.register_function("mermaid", mermaid);
        tera.add_raw_template(&name, content).map_err(template_err)?;

        let ast = &tera.get_template(&name).map_err(template_err)?.ast;
        if let Some(var) = undefined_in_conditions(ast, ctx) {
            return Err(RenderError::UndefinedVariable {
                name: var,
                path: source.to_path_buf(),
            });
        }

        let tera_ctx = ctx.to_tera_context().map_err(template_err)?;
        tera.render(&name, &tera_ctx).map_err(|err| {
            if let Some(diagram) = failure.lock().ok().and_then(|mut slot| slot.take()) {
                return RenderError::Diagram(diagram);
            }
            match undefined_variable(&err) {
                Some(var) => RenderError::UndefinedVariable {
                    name: var,
                    path: source.to_path_buf(),
                },
                None => template_err(err),
            }
        })
    }
}

/// Name of the missing variable if `err` (or anything it wraps) is tera's
/// "Variable `x` not found in context" failure.
fn undefined_variable(err: &tera::Error) -> Option<String> {
    const PREFIX: &str = "Variable `";
    const SUFFIX: &str = "` not found in context";

    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = current {
        let message = e.to_string();
        if let Some(start) = message.find(PREFIX) {
            let rest = &message[start + PREFIX.len()..];
            if let Some(end) = rest.find(SUFFIX) {
                return Some(rest[..end].to_string());
            }
        }
        current = e.source();
    }
    None
}

// ---------------------------------------------------------------------------
// Strict conditions
// ---------------------------------------------------------------------------

/// First variable tested by an `if`/`elif` that is neither in the context nor
/// bound inside the template. Tera evaluates such tests as false; sources must
/// fail instead. `x is defined` guards `x` for the rest of an `and` chain and
/// for the branch body; `x is not defined or ...` guards the right-hand side.
fn undefined_in_conditions(nodes: &[Node], ctx: &RenderContext) -> Option<String> {
    let mut bound: HashSet<String> = ["loop", "__tera_context"].map(String::from).into();
    collect_bindings(nodes, &mut bound);
    StrictConditions { values: ctx.values(), bound }.first_missing(nodes, &HashSet::new())
}

/// Names introduced by `set`, `for` and macro arguments anywhere in `nodes`.
fn collect_bindings(nodes: &[Node], bound: &mut HashSet<String>) {
    for node in nodes {
        match node {
            Node::Set(_, set) => {
                bound.insert(set.key.clone());
            }
            Node::Forloop(_, forloop, _) => {
                bound.extend(forloop.key.iter().cloned());
                bound.insert(forloop.value.clone());
            }
            Node::MacroDefinition(_, def, _) => bound.extend(def.args.keys().cloned()),
            _ => {}
        }
        for body in children(node) {
            collect_bindings(body, bound);
        }
    }
}

fn children(node: &Node) -> Vec<&[Node]> {
    match node {
        Node::If(cond, _) => cond
            .conditions
            .iter()
            .map(|(_, _, body)| body.as_slice())
            .chain(cond.otherwise.iter().map(|(_, body)| body.as_slice()))
            .collect(),
        Node::Forloop(_, forloop, _) => std::iter::once(forloop.body.as_slice())
            .chain(forloop.empty_body.as_deref())
            .collect(),
        Node::MacroDefinition(_, def, _) => vec![def.body.as_slice()],
        Node::Block(_, block, _) => vec![block.body.as_slice()],
        Node::FilterSection(_, section, _) => vec![section.body.as_slice()],
        _ => vec![],
    }
}

struct StrictConditions<'a> {
    values: &'a Map<String, Value>,
    bound: HashSet<String>,
}

impl StrictConditions<'_> {
    fn first_missing(&self, nodes: &[Node], guarded: &HashSet<String>) -> Option<String> {
        for node in nodes {
            let missing = match node {
                Node::If(cond, _) => self.branches(cond, guarded),
                _ => children(node)
                    .into_iter()
                    .find_map(|body| self.first_missing(body, guarded)),
            };
            if missing.is_some() {
                return missing;
            }
        }
        None
    }

    fn branches(&self, cond: &tera::ast::If, guarded: &HashSet<String>) -> Option<String> {
        for (_, expr, body) in &cond.conditions {
            let mut inner = guarded.clone();
            if let Some(name) = self.missing_in(expr, &mut inner) {
                return Some(name);
            }
            if let Some(name) = self.first_missing(body, &inner) {
                return Some(name);
            }
        }
        let (_, body) = cond.otherwise.as_ref()?;
        self.first_missing(body, guarded)
    }

    /// Checks `expr`, adding to `guarded` the names its truth implies defined.
    fn missing_in(&self, expr: &Expr, guarded: &mut HashSet<String>) -> Option<String> {
        let missing = match &expr.val {
            ExprVal::Ident(ident) => self.missing_ident(ident, guarded),
            ExprVal::Test(test) if test.name == "defined" || test.name == "undefined" => {
                if let Some((ident, true)) = defined_test(expr) {
                    guarded.insert(ident.to_string());
                }
                None
            }
            ExprVal::Test(test) => self
                .missing_ident(&test.ident, guarded)
                .or_else(|| self.missing_in_all(&test.args, guarded)),
            ExprVal::Logic(logic) => match logic.operator {
                LogicOperator::And => self
                    .missing_in(&logic.lhs, guarded)
                    .or_else(|| self.missing_in(&logic.rhs, guarded)),
                LogicOperator::Or => {
                    let mut rhs_guarded = guarded.clone();
                    if let Some((ident, false)) = defined_test(&logic.lhs) {
                        rhs_guarded.insert(ident.to_string());
                    }
                    self.missing_in(&logic.lhs, &mut guarded.clone())
                        .or_else(|| self.missing_in(&logic.rhs, &mut rhs_guarded))
                }
                _ => self
                    .missing_in(&logic.lhs, &mut guarded.clone())
                    .or_else(|| self.missing_in(&logic.rhs, &mut guarded.clone())),
            },
            ExprVal::Math(math) => self
                .missing_in(&math.lhs, &mut guarded.clone())
                .or_else(|| self.missing_in(&math.rhs, &mut guarded.clone())),
            ExprVal::In(contains) => self
                .missing_in(&contains.lhs, &mut guarded.clone())
                .or_else(|| self.missing_in(&contains.rhs, &mut guarded.clone())),
            ExprVal::FunctionCall(call) => self.missing_in_all(call.args.values(), guarded),
            ExprVal::MacroCall(call) => self.missing_in_all(call.args.values(), guarded),
            ExprVal::Array(items) => self.missing_in_all(items, guarded),
            ExprVal::StringConcat(concat) => concat.values.iter().find_map(|val| match val {
                ExprVal::Ident(ident) => self.missing_ident(ident, guarded),
                _ => None,
            }),
            _ => None,
        };
        missing.or_else(|| {
            expr.filters
                .iter()
                .find_map(|filter| self.missing_in_all(filter.args.values(), guarded))
        })
    }

    fn missing_in_all<'e>(
        &self,
        exprs: impl IntoIterator<Item = &'e Expr>,
        guarded: &HashSet<String>,
    ) -> Option<String> {
        exprs
            .into_iter()
            .find_map(|expr| self.missing_in(expr, &mut guarded.clone()))
    }

    fn missing_ident(&self, ident: &str, guarded: &HashSet<String>) -> Option<String> {
        let root = ident.split(['.', '[']).next().unwrap_or(ident);
        if self.bound.contains(root) || guarded.contains(root) || guarded.contains(ident) {
            return None;
        }
        lookup(self.values, ident).is_none().then(|| ident.to_string())
    }
}

/// `(ident, true)` for `x is defined`, `(ident, false)` for `x is not defined`
/// or `not x is defined`; `undefined` flips the sense.
fn defined_test(expr: &Expr) -> Option<(&str, bool)> {
    let ExprVal::Test(test) = &expr.val else {
        return None;
    };
    let positive = match test.name.as_str() {
        "defined" => true,
        "undefined" => false,
        _ => return None,
    };
    Some((test.ident.as_str(), positive ^ test.negated ^ expr.negated))
}

/// Resolve a dotted identifier (`page.meta.0`) against the context. Anything
/// from the first `[` on is not resolved.
fn lookup<'v>(values: &'v Map<String, Value>, ident: &str) -> Option<&'v Value> {
    let path = ident.split('[').next().unwrap_or(ident);
    let mut segments = path.split('.');
    let mut current = values.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

// ---------------------------------------------------------------------------
// mermaid(...)
// ---------------------------------------------------------------------------

/// Arguments accepted by the `mermaid` template function.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MermaidArgs {
    #[serde(alias = "diagram")]
    inp: String,
    #[serde(default = "default_ext")]
    ext: String,
    #[serde(default = "default_align")]
    align: Option<String>,
    #[serde(default)]
    caption: Option<String>,
    #[serde(default = "yes")]
    use_cached: bool,
    #[serde(default = "yes")]
    use_myst_syntax: bool,
    #[serde(default)]
    theme: Option<String>,
    #[serde(default)]
    scale: Option<u32>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    background_color: Option<String>,
}

fn default_ext() -> String {
    "png".to_string()
}

fn default_align() -> Option<String> {
    Some("center".to_string())
}

fn yes() -> bool {
    true
}

impl MermaidArgs {
    fn options(&self) -> DiagramOptions {
        let defaults = DiagramOptions::default();
        DiagramOptions {
            theme: self.theme.clone().unwrap_or(defaults.theme),
            scale: self.scale.unwrap_or(defaults.scale),
            width: self.width.unwrap_or(defaults.width),
            height: self.height,
            background_color: self.background_color.clone().unwrap_or(defaults.background_color),
        }
    }

    /// Markdown that embeds `image` (a file name next to the document).
    fn markdown(&self, image: &str) -> String {
        if !self.use_myst_syntax {
            let alt = self.caption.as_deref().unwrap_or(image);
            return format!("![{alt}]({image})");
        }

        let directive = if self.caption.is_some() { "figure" } else { "image" };
        let mut lines = vec![format!(":::{{{directive}}} {image}")];
        if let Some(width) = self.width {
            lines.push(format!(":width: {width}px"));
        }
        if let Some(height) = self.height {
            lines.push(format!(":height: {height}px"));
        }
        if let Some(align) = &self.align {
            lines.push(format!(":align: {align}"));
        }
        if let Some(caption) = &self.caption {
            lines.push(String::new());
            lines.push(caption.clone());
        }
        lines.push(":::".to_string());
        lines.join("\n")
    }
}

/// Stable image file stem for a diagram: hex SHA-256 of the input text and
/// the full argument set.
pub fn diagram_key(inp: &str, args: &HashMap<String, Value>) -> String {
    let sorted: BTreeMap<&String, &Value> = args.iter().collect();
    let salt = serde_json::to_string(&sorted).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(inp.as_bytes());
    hasher.update(salt.as_bytes());
    hex::encode(hasher.finalize())
}

struct MermaidFunction {
    runner: Arc<dyn ProcessRunner>,
    src_dir: PathBuf,
    out_dir: PathBuf,
    /// Typed failure handed back to [`TemplateEngine::render`].
    failure: Arc<Mutex<Option<DiagramError>>>,
}

impl MermaidFunction {
    fn input(&self, inp: &str) -> DiagramInput {
        if inp.trim_end().ends_with(".mmd") && !inp.contains('\n') {
            DiagramInput::File(self.src_dir.join(inp.trim()))
        } else {
            DiagramInput::Inline(inp.to_string())
        }
    }

    fn draw(&self, args: &MermaidArgs, out: &Path) -> Result<(), DiagramError> {
        if out.exists() {
            if args.use_cached {
                tracing::warn!(action = "use-cached", out = %out.display());
                return Ok(());
            }
            std::fs::remove_file(out).map_err(|e| crate::error::diagram_io(out, e))?;
        }
        std::fs::create_dir_all(&self.out_dir).map_err(|e| crate::error::diagram_io(&self.out_dir, e))?;
        render_diagram(self.runner.as_ref(), &self.input(&args.inp), out, &args.options())
    }
}

impl tera::Function for MermaidFunction {
    fn call(&self, raw: &HashMap<String, Value>) -> tera::Result<Value> {
        let object: serde_json::Map<String, Value> =
            raw.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        let args: MermaidArgs = serde_json::from_value(Value::Object(object))
            .map_err(|e| tera::Error::msg(format!("mermaid(): {e}")))?;

        let ext = args.ext.trim_start_matches('.').to_ascii_lowercase();
        let image = format!("{}.{ext}", diagram_key(&args.inp, raw));
        let out = self.out_dir.join(&image);

        if let Err(err) = self.draw(&args, &out) {
            let message = format!("mermaid(): {err}");
            if let Ok(mut slot) = self.failure.lock() {
                *slot = Some(err);
            }
            return Err(tera::Error::msg(message));
        }
        Ok(Value::String(args.markdown(&image)))
    }
}
