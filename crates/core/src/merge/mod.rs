//! Precedence engine combining the explicit descriptor, per-location
//! fragments and the container and default descriptors into one
//! [`EffectiveDescriptor`].
//!
//! Precedence, most specific first: explicit, fragments (as peers, in merge
//! order), container, default. A higher tier is never overwritten; lower
//! tiers only fill gaps.

mod effective;
mod ordering;

pub use effective::{EffectiveDescriptor, EffectiveEntry, Origin};
pub use ordering::{OrderingError, order_fragments};

use crate::config::DEFAULT_JSP_SERVLET_CLASS;
use crate::descriptor::{apply_mapping, builtin_default_source};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use webscope_api::{
    AttributeValue, Attributes, ComponentKind, ContainerSink, DeclarationKey, DescriptorError,
    DescriptorParser, DescriptorSource, Fragment, FragmentKind, PendingMapping, attr,
};

pub const JSP_SERVLET_NAME: &str = "jsp";

/// Irreconcilable disagreement found while merging or configuring.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MergeConflict {
    #[error("{key}: {first} and {second} disagree on '{attribute}'")]
    Attribute {
        key: DeclarationKey,
        attribute: String,
        first: Origin,
        second: Origin,
    },
    #[error("context-param '{name}': {first} and {second} disagree")]
    ContextParam {
        name: String,
        first: Origin,
        second: Origin,
    },
    #[error("url-pattern '{pattern}' is mapped to both '{first}' and '{second}'")]
    UrlPattern {
        pattern: String,
        first: String,
        second: String,
    },
    #[error("{origin} maps {kind} '{name}', which is not declared")]
    UnknownMappingTarget {
        kind: ComponentKind,
        name: String,
        origin: Origin,
    },
}

pub struct FragmentMerger {
    parser: Arc<dyn DescriptorParser>,
    jsp_servlet_class: String,
}

impl FragmentMerger {
    pub fn new(parser: Arc<dyn DescriptorParser>) -> Self {
        Self {
            parser,
            jsp_servlet_class: DEFAULT_JSP_SERVLET_CLASS.to_string(),
        }
    }

    pub fn with_jsp_servlet_class(mut self, class_name: impl Into<String>) -> Self {
        self.jsp_servlet_class = class_name.into();
        self
    }

    pub fn parser(&self) -> &dyn DescriptorParser {
        self.parser.as_ref()
    }

    /// Parse the default descriptor, falling back to the built-in one.
    pub fn parse_default_fragment(
        &self,
        source: Option<&DescriptorSource>,
    ) -> Result<Fragment, DescriptorError> {
        match source {
            Some(source) => self.parser.parse(source, FragmentKind::Default),
            None => self
                .parser
                .parse(&builtin_default_source(), FragmentKind::Default),
        }
    }

    /// Parse the container descriptor; absent means empty.
    pub fn parse_container_fragment(
        &self,
        source: Option<&DescriptorSource>,
    ) -> Result<Fragment, DescriptorError> {
        match source {
            Some(source) => self.parser.parse(source, FragmentKind::Container),
            None => Ok(Fragment::new(FragmentKind::Container)),
        }
    }

    /// Merge order of `fragments` (scan order), honoring the explicit
    /// descriptor's absolute ordering when it has one.
    pub fn order_fragments(
        &self,
        explicit: &Fragment,
        fragments: &[Fragment],
    ) -> Result<Vec<usize>, OrderingError> {
        order_fragments(explicit.absolute_ordering.as_deref(), fragments)
    }

    /// Seed an effective descriptor with everything the explicit descriptor
    /// declares.
    pub fn begin(&self, explicit: &Fragment) -> EffectiveDescriptor {
        let mut effective = EffectiveDescriptor {
            display_name: explicit.display_name.clone(),
            version: explicit.version.clone(),
            metadata_complete: explicit.metadata_complete,
            ..EffectiveDescriptor::default()
        };
        for decl in explicit.declarations() {
            effective.entries.insert(
                decl.key(),
                EffectiveEntry {
                    declaration: decl.clone(),
                    origin: Origin::Explicit,
                },
            );
        }
        effective.context_params = explicit.context_params.clone();
        effective.welcome_files = explicit.welcome_files.clone();
        effective.pending_mappings = explicit
            .pending_mappings
            .iter()
            .map(|m| (m.clone(), Origin::Explicit))
            .collect();
        effective
    }

    /// Merge the ordered per-location fragments as one tier of peers. What
    /// the explicit descriptor sets is never touched; the fragments fill
    /// the rest and must agree with each other on it.
    pub fn merge_fragments(
        &self,
        effective: &mut EffectiveDescriptor,
        ordered: &[&Fragment],
    ) -> Result<(), MergeConflict> {
        // Peer accumulation first so that explicit values lock attributes
        // for every fragment, not just the first one to arrive.
        let mut combined: IndexMap<DeclarationKey, EffectiveEntry> = IndexMap::new();
        let mut params: IndexMap<String, (String, Origin)> = IndexMap::new();

        for fragment in ordered {
            let origin = Origin::of(fragment);
            effective.fragment_order.push(fragment_label(fragment));

            for decl in fragment.declarations() {
                let key = decl.key();
                let explicit = effective
                    .entries
                    .get(&key)
                    .map(|entry| &entry.declaration.attributes);
                let locked = |name: &str, param: Option<&str>| match (explicit, param) {
                    (None, _) => false,
                    (Some(attrs), None) => {
                        attrs.contains(name) && !matches!(attrs.get(name), Some(AttributeValue::Params(_)))
                    }
                    (Some(attrs), Some(param)) => attrs
                        .params(name)
                        .is_some_and(|p| p.contains_key(param)),
                };

                match combined.get_mut(&key) {
                    None => {
                        let mut declaration = decl.clone();
                        if explicit.is_some() {
                            declaration.attributes = Attributes::new();
                            declaration
                                .attributes
                                .combine_peer(&decl.attributes, locked)
                                .map_err(|clash| MergeConflict::Attribute {
                                    key: key.clone(),
                                    attribute: clash.attribute,
                                    first: origin.clone(),
                                    second: origin.clone(),
                                })?;
                        }
                        combined.insert(
                            key,
                            EffectiveEntry {
                                declaration,
                                origin: origin.clone(),
                            },
                        );
                    }
                    Some(existing) => {
                        existing
                            .declaration
                            .attributes
                            .combine_peer(&decl.attributes, locked)
                            .map_err(|clash| MergeConflict::Attribute {
                                key: key.clone(),
                                attribute: clash.attribute,
                                first: existing.origin.clone(),
                                second: origin.clone(),
                            })?;
                    }
                }
            }

            for (name, value) in &fragment.context_params {
                if effective.context_params.contains_key(name) {
                    continue;
                }
                match params.get(name) {
                    None => {
                        params.insert(name.clone(), (value.clone(), origin.clone()));
                    }
                    Some((existing, _)) if existing == value => {}
                    Some((_, first)) => {
                        return Err(MergeConflict::ContextParam {
                            name: name.clone(),
                            first: first.clone(),
                            second: origin,
                        });
                    }
                }
            }

            for file in &fragment.welcome_files {
                if !effective.welcome_files.contains(file) {
                    effective.welcome_files.push(file.clone());
                }
            }

            effective.pending_mappings.extend(
                fragment
                    .pending_mappings
                    .iter()
                    .map(|m| (m.clone(), origin.clone())),
            );
        }

        for (key, incoming) in combined {
            match effective.entries.get_mut(&key) {
                Some(entry) => entry
                    .declaration
                    .attributes
                    .fill_from(&incoming.declaration.attributes),
                None => {
                    effective.entries.insert(key, incoming);
                }
            }
        }
        for (name, (value, _)) in params {
            effective.context_params.insert(name, value);
        }
        Ok(())
    }

    /// Fill gaps from the container or default descriptor. A servlet or
    /// filter the application already declares under the same name replaces
    /// the built-in one; the built-in mappings then target the application's
    /// component.
    pub fn merge_builtin(&self, effective: &mut EffectiveDescriptor, fragment: &Fragment) {
        let origin = match fragment.kind {
            FragmentKind::Container => Origin::Container,
            _ => Origin::Default,
        };

        for decl in fragment.declarations() {
            let key = decl.key();
            if let Some(entry) = effective.entries.get_mut(&key) {
                entry.declaration.attributes.fill_from(&decl.attributes);
                continue;
            }

            let overridden = decl.kind != ComponentKind::Listener
                && decl
                    .name()
                    .is_some_and(|name| effective.named(decl.kind, name).is_some());
            if overridden {
                let name = decl.name().unwrap_or_default().to_string();
                debug!("{} {} '{}' is overridden by the application", origin, decl.kind, name);
                let patterns = decl.url_patterns();
                if !patterns.is_empty() {
                    effective.pending_mappings.push((
                        PendingMapping {
                            kind: decl.kind,
                            name,
                            url_patterns: patterns.to_vec(),
                            servlet_names: Vec::new(),
                            dispatchers: Vec::new(),
                        },
                        origin.clone(),
                    ));
                }
                continue;
            }

            effective.entries.insert(
                key,
                EffectiveEntry {
                    declaration: decl.clone(),
                    origin: origin.clone(),
                },
            );
        }

        for (name, value) in &fragment.context_params {
            effective
                .context_params
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
        if effective.welcome_files.is_empty() {
            effective.welcome_files = fragment.welcome_files.clone();
        }
        effective.pending_mappings.extend(
            fragment
                .pending_mappings
                .iter()
                .map(|m| (m.clone(), origin.clone())),
        );
    }

    /// Rewrite every `jsp-file` servlet into a declaration of the JSP
    /// servlet class carrying the page as its `jspFile` init parameter.
    pub fn convert_jsp_declarations(&self, effective: &mut EffectiveDescriptor) {
        let (jsp_class, jsp_params) = match effective.named(ComponentKind::Servlet, JSP_SERVLET_NAME) {
            Some(entry) => (
                entry
                    .declaration
                    .class_name
                    .clone()
                    .unwrap_or_else(|| self.jsp_servlet_class.clone()),
                entry
                    .declaration
                    .attributes
                    .params(attr::INIT_PARAMS)
                    .cloned()
                    .unwrap_or_default(),
            ),
            None => (self.jsp_servlet_class.clone(), Default::default()),
        };

        for entry in effective.entries.values_mut() {
            let decl = &mut entry.declaration;
            if decl.kind != ComponentKind::Servlet {
                continue;
            }
            let Some(AttributeValue::Text(jsp_file)) = decl.attributes.remove(attr::JSP_FILE) else {
                continue;
            };
            let jsp_file = if jsp_file.starts_with('/') {
                jsp_file
            } else {
                format!("/{jsp_file}")
            };
            debug!("converting JSP servlet '{}' ({})", decl.name().unwrap_or_default(), jsp_file);

            decl.class_name = Some(jsp_class.clone());
            for (name, value) in &jsp_params {
                if !decl
                    .attributes
                    .params(attr::INIT_PARAMS)
                    .is_some_and(|p| p.contains_key(name))
                {
                    decl.attributes.put_param(attr::INIT_PARAMS, name.clone(), value.clone());
                }
            }
            decl.attributes.put_param(attr::INIT_PARAMS, "jspFile", jsp_file);
        }
    }

    /// Bind pending mappings, settle URL-pattern ownership and push the
    /// result into `sink`. Nothing is registered when a conflict is found.
    pub fn apply_to_container(
        &self,
        effective: &mut EffectiveDescriptor,
        sink: &mut dyn ContainerSink,
    ) -> Result<(), MergeConflict> {
        bind_pending_mappings(effective)?;
        settle_url_patterns(effective)?;

        for (name, value) in &effective.context_params {
            sink.set_context_param(name, value);
        }
        for kind in [
            ComponentKind::Listener,
            ComponentKind::Filter,
            ComponentKind::Servlet,
        ] {
            for entry in effective.components(kind) {
                sink.register_component(&entry.declaration);
            }
        }
        for file in &effective.welcome_files {
            sink.add_welcome_file(file);
        }
        Ok(())
    }
}

fn fragment_label(fragment: &Fragment) -> String {
    match (&fragment.name, &fragment.source_location) {
        (Some(name), _) => name.clone(),
        (None, Some(location)) => location.to_string(),
        (None, None) => "<unnamed>".to_string(),
    }
}

fn bind_pending_mappings(effective: &mut EffectiveDescriptor) -> Result<(), MergeConflict> {
    let pending = std::mem::take(&mut effective.pending_mappings);
    for (mapping, origin) in pending {
        let target = effective.entries.values_mut().find(|entry| {
            entry.declaration.kind == mapping.kind
                && entry.declaration.name() == Some(mapping.name.as_str())
        });
        let Some(entry) = target else {
            return Err(MergeConflict::UnknownMappingTarget {
                kind: mapping.kind,
                name: mapping.name,
                origin,
            });
        };
        // A component mapped by a more specific tier keeps those mappings.
        if origin.tier() > entry.origin.tier() && !entry.declaration.url_patterns().is_empty() {
            debug!(
                "ignoring {} mapping of '{}': already mapped by {}",
                origin, mapping.name, entry.origin
            );
            continue;
        }
        apply_mapping(&mut entry.declaration.attributes, &mapping);
    }
    Ok(())
}

fn settle_url_patterns(effective: &mut EffectiveDescriptor) -> Result<(), MergeConflict> {
    // pattern -> (owning key, tier)
    let mut owners: HashMap<String, (DeclarationKey, u8)> = HashMap::new();
    let mut dropped: Vec<(DeclarationKey, String)> = Vec::new();

    for (key, entry) in &effective.entries {
        if entry.declaration.kind != ComponentKind::Servlet {
            continue;
        }
        let tier = entry.origin.tier();
        for pattern in entry.declaration.url_patterns() {
            match owners.get(pattern) {
                None => {
                    owners.insert(pattern.clone(), (key.clone(), tier));
                }
                Some((owner, _)) if owner == key => {}
                Some((owner, owner_tier)) if *owner_tier == tier => {
                    return Err(MergeConflict::UrlPattern {
                        pattern: pattern.clone(),
                        first: servlet_label(effective, owner),
                        second: servlet_label(effective, key),
                    });
                }
                Some((owner, owner_tier)) => {
                    if tier < *owner_tier {
                        debug!("url-pattern '{}' taken over from {} by {}", pattern, owner, key);
                        dropped.push((owner.clone(), pattern.clone()));
                        owners.insert(pattern.clone(), (key.clone(), tier));
                    } else {
                        debug!("url-pattern '{}' of {} shadowed by {}", pattern, key, owner);
                        dropped.push((key.clone(), pattern.clone()));
                    }
                }
            }
        }
    }

    for (key, pattern) in dropped {
        if let Some(entry) = effective.entries.get_mut(&key) {
            let remaining: Vec<String> = entry
                .declaration
                .url_patterns()
                .iter()
                .filter(|p| **p != pattern)
                .cloned()
                .collect();
            entry
                .declaration
                .attributes
                .insert(attr::URL_PATTERNS, AttributeValue::List(remaining));
        }
    }
    Ok(())
}

fn servlet_label(effective: &EffectiveDescriptor, key: &DeclarationKey) -> String {
    effective
        .entry(key)
        .and_then(|entry| entry.declaration.name())
        .map(str::to_string)
        .unwrap_or_else(|| key.to_string())
}
