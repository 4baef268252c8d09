//! An in-memory directory server implementing the connection traits, used
//! to drive the full backend pipeline in integration tests.

use async_trait::async_trait;
use scim_core::error::{Error, Result, ResultCode};
use scim_ldap::{
    Attribute, DirectoryConnection, DirectoryConnector, Entry, Modification, SearchRequest,
    SearchScope,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Shared in-memory entry store. Cloning shares the store, so a clone can be
/// handed to the connector while the test keeps a handle for assertions.
#[derive(Clone, Default)]
pub struct InMemoryDirectoryServer {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl InMemoryDirectoryServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an entry directly, bypassing the connection layer.
    pub fn add(&self, entry: Entry) {
        self.entries
            .lock()
            .unwrap()
            .insert(normalize(entry.dn()), entry);
    }

    /// Fetches an entry directly for assertions.
    pub fn entry(&self, dn: &str) -> Option<Entry> {
        self.entries.lock().unwrap().get(&normalize(dn)).cloned()
    }

    /// Applies modifications directly, bypassing the connection layer.
    pub fn modify_direct(&self, dn: &str, modifications: &[Modification]) {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries
            .get(&normalize(dn))
            .expect("entry to modify exists");
        let updated = apply_modifications(entry, modifications).expect("modification applies");
        entries.insert(normalize(dn), updated);
    }
}

#[async_trait]
impl DirectoryConnector for InMemoryDirectoryServer {
    async fn connect(&self) -> Result<Box<dyn DirectoryConnection>> {
        Ok(Box::new(InMemoryConnection {
            entries: Arc::clone(&self.entries),
        }))
    }
}

struct InMemoryConnection {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

#[async_trait]
impl DirectoryConnection for InMemoryConnection {
    async fn simple_bind(&mut self, _dn: &str, _password: &str) -> Result<()> {
        Ok(())
    }

    async fn search(&mut self, request: &SearchRequest) -> Result<Vec<Entry>> {
        let entries = self.entries.lock().unwrap();
        let base = normalize(&request.base_dn);

        if !entries.contains_key(&base) {
            return Err(no_such_object(&request.base_dn));
        }

        let matched: Vec<Entry> = match request.scope {
            SearchScope::Base => vec![entries[&base].clone()],
            SearchScope::OneLevel => entries
                .iter()
                .filter(|(dn, _)| is_direct_child(dn, &base))
                .map(|(_, entry)| entry.clone())
                .collect(),
            SearchScope::Subtree => entries
                .iter()
                .filter(|(dn, _)| *dn == &base || dn.ends_with(&format!(",{base}")))
                .map(|(_, entry)| entry.clone())
                .collect(),
        };

        if request.size_limit > 0 && matched.len() > request.size_limit as usize {
            return Err(Error::backend(
                ResultCode::SIZE_LIMIT_EXCEEDED,
                "size limit exceeded",
            ));
        }
        Ok(matched)
    }

    async fn add(&mut self, entry: &Entry, post_read: bool) -> Result<Option<Entry>> {
        let mut entries = self.entries.lock().unwrap();
        let key = normalize(entry.dn());
        if entries.contains_key(&key) {
            return Err(Error::backend(
                ResultCode::ENTRY_ALREADY_EXISTS,
                format!("entry {} already exists", entry.dn()),
            ));
        }
        if let Some(parent) = parent_dn(&key) {
            if !entries.contains_key(&parent) {
                return Err(no_such_object(&parent));
            }
        }
        entries.insert(key, entry.clone());
        Ok(post_read.then(|| entry.clone()))
    }

    async fn modify(
        &mut self,
        dn: &str,
        modifications: &[Modification],
        post_read: bool,
    ) -> Result<Option<Entry>> {
        let mut entries = self.entries.lock().unwrap();
        let key = normalize(dn);
        let current = entries.get(&key).ok_or_else(|| no_such_object(dn))?;
        let updated = apply_modifications(current, modifications)?;
        entries.insert(key, updated.clone());
        Ok(post_read.then_some(updated))
    }

    async fn delete(&mut self, dn: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        entries
            .remove(&normalize(dn))
            .map(|_| ())
            .ok_or_else(|| no_such_object(dn))
    }

    async fn unbind(&mut self) -> Result<()> {
        Ok(())
    }
}

fn normalize(dn: &str) -> String {
    dn.to_ascii_lowercase()
}

fn parent_dn(dn: &str) -> Option<String> {
    let mut escaped = false;
    for (idx, ch) in dn.char_indices() {
        if escaped {
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == ',' {
            return Some(dn[idx + 1..].trim_start().to_string());
        }
    }
    None
}

fn is_direct_child(dn: &str, base: &str) -> bool {
    parent_dn(dn).is_some_and(|parent| parent == base)
}

fn no_such_object(dn: &str) -> Error {
    Error::backend(
        ResultCode::NO_SUCH_OBJECT,
        format!("entry {dn} does not exist"),
    )
}

fn apply_modifications(entry: &Entry, modifications: &[Modification]) -> Result<Entry> {
    let mut attributes: HashMap<String, Vec<String>> = entry
        .attributes()
        .map(|attribute| (attribute.name, attribute.values))
        .collect();

    for modification in modifications {
        match modification {
            Modification::Add { attribute, values } => {
                let key = find_key(&attributes, attribute).unwrap_or_else(|| attribute.clone());
                attributes.entry(key).or_default().extend(values.clone());
            }
            Modification::Delete { attribute, values } => {
                let key = find_key(&attributes, attribute).ok_or_else(|| {
                    Error::backend(
                        ResultCode(16),
                        format!("attribute {attribute} does not exist"),
                    )
                })?;
                if values.is_empty() {
                    attributes.remove(&key);
                } else {
                    let remaining = attributes.get_mut(&key).expect("key present");
                    remaining.retain(|value| !values.contains(value));
                    if remaining.is_empty() {
                        attributes.remove(&key);
                    }
                }
            }
            Modification::Replace { attribute, values } => {
                let key = find_key(&attributes, attribute).unwrap_or_else(|| attribute.clone());
                if values.is_empty() {
                    attributes.remove(&key);
                } else {
                    attributes.insert(key, values.clone());
                }
            }
        }
    }

    Ok(Entry::with_attributes(entry.dn(), attributes))
}

fn find_key(attributes: &HashMap<String, Vec<String>>, name: &str) -> Option<String> {
    if attributes.contains_key(name) {
        return Some(name.to_string());
    }
    attributes
        .keys()
        .find(|key| key.eq_ignore_ascii_case(name))
        .cloned()
}

/// An entry for a directory suffix such as `dc=example,dc=com`.
pub fn domain_entry(dn: &str) -> Entry {
    let dc = dn
        .split(',')
        .next()
        .and_then(|rdn| rdn.split('=').nth(1))
        .unwrap_or("example");
    Entry::new(dn)
        .with_attribute(Attribute::new("objectClass", ["top", "domain"]))
        .with_attribute(Attribute::single("dc", dc))
}

/// A person entry in the shape the user mapper expects.
pub fn user_entry(uid: &str, parent: &str, given_name: &str, surname: &str) -> Entry {
    Entry::new(format!("uid={uid},{parent}"))
        .with_attribute(Attribute::new(
            "objectClass",
            ["top", "person", "organizationalPerson", "inetOrgPerson"],
        ))
        .with_attribute(Attribute::single("uid", uid))
        .with_attribute(Attribute::single("cn", format!("{given_name} {surname}")))
        .with_attribute(Attribute::single("sn", surname))
        .with_attribute(Attribute::single("givenName", given_name))
}
