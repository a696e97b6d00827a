/// Offset resolution: the scope and inferred type at a cursor position.
///
/// Resolving an offset parses the unit once, reflects it, and builds its
/// [`ScopeForest`].  The scope at the offset is the innermost recorded
/// scope containing it; the type is derived from the expression being
/// typed there:
///
///   - After `receiver->partial` the receiver chain is evaluated and the
///     member `partial` looked up on its type.  With nothing typed after
///     the operator the result is the receiver's type.
///   - On a `$name` token the result is the variable's binding.
///   - Anywhere else the type is Unknown.
///
/// Source that is being edited usually does not parse.  Before giving up
/// the resolver tries neutralized copies of the text with the fetch tail
/// or the variable token blanked out.  Blanking and terminating overwrite
/// bytes in place, so everything derived from the copy lines up with the
/// caller's text.  Only a `;` needed at the very end of the text is
/// appended, and ranges reported back are clamped to the text.
mod infer;
mod scope;
mod subject;
mod walker;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::error::{EngineError, Result};
use crate::parser::{extract_unit, with_program};
use crate::reflector::{MemberTable, ReflectedUnit, Reflector};
use crate::source::{ContentHash, SourceUnit};
use crate::types::{ClassName, InferredType, OffsetRange};

pub use scope::{Binding, Scope, ScopeForest, ScopeId, ScopeKind};

use infer::{NameContext, method_return_type, property_type, type_from_hint};
use subject::{FetchSite, Segment, SubjectBase, VariableSite};
use walker::ScopeBuilder;

/// The parse-derived structures of one (possibly neutralized) text.
#[derive(Debug)]
pub struct Analysis {
    hash: ContentHash,
    unit: ReflectedUnit,
    forest: ScopeForest,
}

impl Analysis {
    pub fn unit(&self) -> &ReflectedUnit {
        &self.unit
    }

    pub fn forest(&self) -> &ScopeForest {
        &self.forest
    }
}

/// The scope enclosing an offset and every binding visible there.
#[derive(Debug, Clone, Serialize)]
pub struct ScopeSummary {
    pub id: ScopeId,
    pub kind: ScopeKind,
    pub range: OffsetRange,
    /// The class-like whose body contains the offset.
    pub class: Option<ClassName>,
    pub bindings: Vec<Binding>,
}

/// A member fetch being typed at the offset.
#[derive(Debug, Clone, Serialize)]
pub struct FetchContext {
    pub receiver_type: InferredType,
    pub partial: String,
    pub nullsafe: bool,
    /// Members of the receiver type, when it resolves to a known class.
    pub members: Option<MemberTable>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OffsetResolution {
    pub offset: u32,
    pub scope: ScopeSummary,
    pub inferred_type: InferredType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch: Option<FetchContext>,
    /// The `$name` typed so far when the offset is on a variable token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variable_prefix: Option<String>,
}

pub struct OffsetResolver {
    reflector: Arc<Reflector>,
    /// Latest analysis per path, keyed by the hash of the analysed text.
    cache: Mutex<HashMap<PathBuf, Arc<Analysis>>>,
}

impl OffsetResolver {
    pub fn new(reflector: Arc<Reflector>) -> Self {
        Self {
            reflector,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn reflector(&self) -> &Reflector {
        &self.reflector
    }

    /// Resolve the scope and inferred type at `offset` in `unit`.
    ///
    /// Offsets past the end of the text are clamped to its end.
    pub fn resolve(&self, unit: &SourceUnit, offset: u32) -> Result<OffsetResolution> {
        let text = unit.text();
        let offset = offset.min(text.len() as u32);

        let fetch_site = subject::fetch_site(text, offset);
        let variable_site = match fetch_site {
            Some(_) => None,
            None => subject::variable_site(text, offset),
        };

        let analysis = self.analysis_for(unit, offset, fetch_site.as_ref(), variable_site.as_ref())?;
        // An arrow function's span ends with its body expression, which
        // stops short of the cursor once the fetch tail is blanked.  The
        // start of the expression being typed always lies inside it.
        let anchor = match (&fetch_site, &variable_site) {
            (Some(site), _) => site.receiver.start,
            (None, Some(site)) => site.token.start,
            (None, None) => offset,
        };
        let forest = &analysis.forest;
        let scope_id = forest.scope_at(anchor);
        let scope = forest.get(scope_id);

        // A terminator appended past the end of the text may stretch
        // ranges by one byte.
        let end = text.len() as u32;
        let summary = ScopeSummary {
            id: scope_id,
            kind: scope.kind,
            range: OffsetRange::new(scope.range.start.min(end), scope.range.end.min(end)),
            class: analysis.unit.class_at(offset).map(|c| c.name.clone()),
            bindings: forest.visible(scope_id, offset),
        };

        let mut resolution = OffsetResolution {
            offset,
            scope: summary,
            inferred_type: InferredType::Unknown,
            fetch: None,
            variable_prefix: None,
        };

        if let Some(site) = fetch_site {
            let receiver_type = self.receiver_type(&analysis, scope_id, text, &site);
            resolution.inferred_type = self.member_type(&analysis, text, &site, &receiver_type);
            let members = receiver_type.class_name().and_then(|name| {
                self.reflector
                    .find_class(name, Some(&analysis.unit))
                    .map(|class| self.reflector.members(&class, Some(&analysis.unit)))
            });
            resolution.fetch = Some(FetchContext {
                receiver_type,
                partial: site.partial,
                nullsafe: site.nullsafe,
                members,
            });
        } else if let Some(site) = variable_site {
            let name = &text[site.token.as_usize()];
            resolution.inferred_type = forest.lookup(scope_id, name, offset);
            resolution.variable_prefix = Some(site.partial);
        }

        tracing::debug!(
            "resolved {}@{} to {} in {:?} scope",
            unit.path().display(),
            offset,
            resolution.inferred_type,
            resolution.scope.kind
        );
        Ok(resolution)
    }

    /// Every scope recorded for `unit`, which must parse as written.
    pub fn scopes(&self, unit: &SourceUnit) -> Result<Vec<Scope>> {
        let analysis = self.analyse(unit, unit.text())?;
        Ok(analysis.forest.scopes().to_vec())
    }

    /// Parse the first candidate text that the parser accepts.  When none
    /// does, the error for the text as written is returned.
    fn analysis_for(
        &self,
        unit: &SourceUnit,
        offset: u32,
        fetch: Option<&FetchSite>,
        variable: Option<&VariableSite>,
    ) -> Result<Arc<Analysis>> {
        let text = unit.text();
        let mut candidates: Vec<String> = Vec::new();
        match (fetch, variable) {
            (Some(site), _) => {
                candidates.push(subject::neutralize(text, site.tail));
                candidates.push(text.to_string());
            }
            (None, Some(site)) => {
                candidates.push(text.to_string());
                candidates.extend(subject::terminate_at(text, site.token.end));
                candidates.push(subject::neutralize(text, site.token));
            }
            (None, None) => {
                candidates.push(text.to_string());
                candidates.extend(subject::terminate_at(text, offset));
            }
        }

        let mut original_error: Option<EngineError> = None;
        let mut last_error: Option<EngineError> = None;
        for candidate in &candidates {
            match self.analyse(unit, candidate) {
                Ok(analysis) => return Ok(analysis),
                Err(e) if candidate == text => original_error = Some(e),
                Err(e) => {
                    tracing::debug!("candidate text for {} did not parse: {}", unit.path().display(), e);
                    last_error = Some(e);
                }
            }
        }

        Err(original_error
            .or(last_error)
            .unwrap_or_else(|| EngineError::Syntax {
                path: unit.path().to_path_buf(),
                offset,
                message: "no parseable text".to_string(),
            }))
    }

    fn analyse(&self, unit: &SourceUnit, text: &str) -> Result<Arc<Analysis>> {
        let hash = ContentHash::compute(text.as_bytes());
        if let Some(cached) = self.cache.lock().get(unit.path())
            && cached.hash == hash
        {
            tracing::debug!("analysis cache hit for {}", unit.path().display());
            return Ok(Arc::clone(cached));
        }

        let path = unit.path();
        let analysis = with_program(path, text, |program| {
            let reflected = extract_unit(program, text, path, hash.clone());
            let forest = ScopeBuilder::new(&self.reflector, &reflected, text).build(program);
            Analysis {
                hash: hash.clone(),
                unit: reflected,
                forest,
            }
        })?;
        let analysis = Arc::new(analysis);

        self.cache
            .lock()
            .insert(path.to_path_buf(), Arc::clone(&analysis));
        Ok(analysis)
    }

    fn name_context<'a>(&self, analysis: &'a Analysis, offset: u32) -> NameContext<'a> {
        match analysis.unit.class_at(offset) {
            Some(class) => NameContext::of_class(class),
            None => {
                let (namespace, imports) = analysis.unit.name_context(offset);
                NameContext {
                    namespace,
                    imports,
                    self_class: None,
                    static_class: None,
                    parent_class: None,
                }
            }
        }
    }

    /// Evaluate the receiver chain of a fetch.
    fn receiver_type(
        &self,
        analysis: &Analysis,
        scope: ScopeId,
        text: &str,
        site: &FetchSite,
    ) -> InferredType {
        let receiver_text = &text[site.receiver.as_usize()];
        let Some(chain) = subject::parse_subject(receiver_text) else {
            tracing::debug!("unsupported receiver expression {:?}", receiver_text);
            return InferredType::Unknown;
        };

        let at = site.receiver.start;
        let local = Some(&analysis.unit);
        let mut current = match chain.base {
            SubjectBase::Variable(name) => analysis.forest.lookup(scope, &name, at),
            SubjectBase::New(name) => type_from_hint(&name, &self.name_context(analysis, at)),
            SubjectBase::StaticCall { class, method } => {
                match type_from_hint(&class, &self.name_context(analysis, at)) {
                    InferredType::Class(class) => {
                        method_return_type(&self.reflector, &class, &method, local)
                    }
                    _ => InferredType::Unknown,
                }
            }
            SubjectBase::FunctionCall(_) => InferredType::Unknown,
        };

        for segment in chain.segments {
            let Some(class) = current.class_name() else {
                return InferredType::Unknown;
            };
            current = match segment {
                Segment::Property(name) => property_type(&self.reflector, class, &name, local),
                Segment::Method(name) => method_return_type(&self.reflector, class, &name, local),
            };
        }
        current
    }

    /// Type of the member named at a fetch site; the receiver's type when
    /// no member name has been typed yet.
    fn member_type(
        &self,
        analysis: &Analysis,
        text: &str,
        site: &FetchSite,
        receiver: &InferredType,
    ) -> InferredType {
        if site.member.is_empty() {
            return receiver.clone();
        }
        let Some(class) = receiver.class_name() else {
            return InferredType::Unknown;
        };

        let local = Some(&analysis.unit);
        let is_call = text
            .get(site.tail.end as usize..)
            .map(|rest| rest.trim_start().starts_with('('))
            .unwrap_or(false);
        if is_call {
            method_return_type(&self.reflector, class, &site.member, local)
        } else {
            property_type(&self.reflector, class, &site.member, local)
        }
    }
}
