//! Lazy `$ref` resolution over an arena of loaded files
//!
//! Nodes are addressed by `(file, pointer)`. A reference is followed only when
//! a node is read through [`Node::resolve`] / [`Node::get`], so cyclic schemas
//! never unroll and a relative file reference is always interpreted against
//! the file that declared it. Each file is parsed at most once; each resolved
//! location is memoized.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use percent_encoding::percent_decode_str;
use serde_json::Value;

use crate::loader::{LoadError, parse_document};

static NULL: Value = Value::Null;

/// Index of a file in the resolver arena. The root document is always `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(usize);

impl FileId {
    pub const ROOT: Self = Self(0);
}

/// One parsed contract file.
#[derive(Debug)]
pub struct SourceFile {
    /// Canonical path, `None` for documents parsed from memory
    pub path: Option<PathBuf>,
    pub root: Value,
}

impl SourceFile {
    fn label(&self) -> String {
        self.path
            .as_ref()
            .map_or_else(|| "<inline>".to_string(), |p| p.display().to_string())
    }
}

type Location = (FileId, String);

/// Load-session resolver. Not shared across threads; the finished
/// [`Document`](crate::Document) keeps only resolved, owned data.
#[derive(Debug)]
pub struct Resolver {
    files: RefCell<Vec<Rc<SourceFile>>>,
    by_path: RefCell<HashMap<PathBuf, FileId>>,
    memo: RefCell<HashMap<Location, Location>>,
}

impl Resolver {
    #[must_use]
    pub fn new(root: SourceFile) -> Self {
        let mut by_path = HashMap::new();
        if let Some(path) = &root.path {
            by_path.insert(path.clone(), FileId::ROOT);
        }
        Self {
            files: RefCell::new(vec![Rc::new(root)]),
            by_path: RefCell::new(by_path),
            memo: RefCell::new(HashMap::new()),
        }
    }

    /// Resolved root node of the root document.
    ///
    /// # Errors
    ///
    /// Returns error if the root itself is an unresolvable reference.
    pub fn root(&self) -> Result<Node<'_>, LoadError> {
        self.resolve(FileId::ROOT, "")
    }

    /// Number of files parsed so far.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.borrow().len()
    }

    /// Paths of every file parsed so far, root first.
    #[must_use]
    pub fn file_paths(&self) -> Vec<PathBuf> {
        self.files
            .borrow()
            .iter()
            .filter_map(|f| f.path.clone())
            .collect()
    }

    fn file(&self, id: FileId) -> Rc<SourceFile> {
        Rc::clone(&self.files.borrow()[id.0])
    }

    /// Node at `(file, pointer)` without following a reference found there.
    ///
    /// # Errors
    ///
    /// Returns error if the pointer does not exist in the file.
    pub fn node(&self, id: FileId, pointer: &str) -> Result<Node<'_>, LoadError> {
        let file = self.file(id);
        if file.root.pointer(pointer).is_none() {
            return Err(LoadError::PointerNotFound {
                file: file.label(),
                pointer: pointer.to_string(),
            });
        }
        Ok(Node {
            resolver: self,
            file,
            id,
            pointer: pointer.to_string(),
        })
    }

    /// Node at `(file, pointer)`, following references transitively.
    ///
    /// # Errors
    ///
    /// Returns error on a missing file or pointer, an unparseable file, or a
    /// reference loop.
    pub fn resolve(&self, id: FileId, pointer: &str) -> Result<Node<'_>, LoadError> {
        let start: Location = (id, pointer.to_string());
        if let Some((id, pointer)) = self.memo.borrow().get(&start).cloned() {
            return self.node(id, &pointer);
        }

        let mut chain: Vec<Location> = Vec::new();
        let mut seen: HashSet<Location> = HashSet::new();
        let mut current = start;

        loop {
            if let Some(target) = self.memo.borrow().get(&current).cloned() {
                current = target;
                break;
            }
            let node = self.node(current.0, &current.1)?;
            let Some(reference) = node.reference() else {
                break;
            };
            if !seen.insert(current.clone()) {
                return Err(LoadError::ReferenceLoop {
                    file: node.file.label(),
                    pointer: current.1,
                });
            }
            let next = self.target_of(current.0, reference)?;
            chain.push(current);
            current = next;
        }

        let mut memo = self.memo.borrow_mut();
        for location in chain {
            memo.insert(location, current.clone());
        }
        drop(memo);
        self.node(current.0, &current.1)
    }

    /// Location a `$ref` string declared in `from` points at.
    ///
    /// # Errors
    ///
    /// Returns error if a referenced file is missing or unparseable.
    pub fn target_of(&self, from: FileId, reference: &str) -> Result<(FileId, String), LoadError> {
        let (file_part, fragment) = match reference.split_once('#') {
            Some((file, fragment)) => (file, fragment),
            None => (reference, ""),
        };
        let id = if file_part.is_empty() {
            from
        } else {
            self.load_relative(from, file_part)?
        };
        Ok((id, decode_fragment(fragment)))
    }

    fn load_relative(&self, from: FileId, relative: &str) -> Result<FileId, LoadError> {
        let referencing = self.file(from);
        let relative = percent_decode_str(relative).decode_utf8_lossy();
        let base = referencing
            .path
            .as_deref()
            .and_then(Path::parent)
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let joined = base.join(relative.as_ref());

        if !joined.exists() {
            return Err(LoadError::FileNotFound {
                referenced_from: referencing.label(),
                missing: joined,
            });
        }
        let canonical = joined.canonicalize().map_err(|e| LoadError::Io {
            path: joined.clone(),
            message: e.to_string(),
        })?;

        if let Some(id) = self.by_path.borrow().get(&canonical) {
            return Ok(*id);
        }

        let content = std::fs::read_to_string(&canonical).map_err(|e| LoadError::Io {
            path: canonical.clone(),
            message: e.to_string(),
        })?;
        let root = parse_document(&canonical, &content)?;
        tracing::debug!(path = %canonical.display(), "loaded referenced file");

        let mut files = self.files.borrow_mut();
        let id = FileId(files.len());
        files.push(Rc::new(SourceFile {
            path: Some(canonical.clone()),
            root,
        }));
        self.by_path.borrow_mut().insert(canonical, id);
        Ok(id)
    }
}

/// URI fragment → JSON pointer. Percent-escapes are decoded here; `~0`/`~1`
/// stay escaped until a token is read.
fn decode_fragment(fragment: &str) -> String {
    percent_decode_str(fragment).decode_utf8_lossy().into_owned()
}

/// Escape one JSON pointer token (RFC 6901).
#[must_use]
pub fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Unescape one JSON pointer token (RFC 6901).
#[must_use]
pub fn unescape_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

/// A location in the loaded contract.
#[derive(Debug, Clone)]
pub struct Node<'r> {
    resolver: &'r Resolver,
    file: Rc<SourceFile>,
    id: FileId,
    pointer: String,
}

impl<'r> Node<'r> {
    /// Raw value at this location. A reference object is returned as-is.
    #[must_use]
    pub fn value(&self) -> &Value {
        self.file.root.pointer(&self.pointer).unwrap_or(&NULL)
    }

    #[must_use]
    pub const fn file_id(&self) -> FileId {
        self.id
    }

    #[must_use]
    pub fn pointer(&self) -> &str {
        &self.pointer
    }

    #[must_use]
    pub fn location(&self) -> (FileId, String) {
        (self.id, self.pointer.clone())
    }

    #[must_use]
    pub fn file_label(&self) -> String {
        self.file.label()
    }

    /// The `$ref` string, if this node is a reference object.
    #[must_use]
    pub fn reference(&self) -> Option<&str> {
        self.value().get("$ref").and_then(Value::as_str)
    }

    /// This node with any reference followed.
    ///
    /// # Errors
    ///
    /// Returns the resolver's error for a broken reference.
    pub fn resolve(&self) -> Result<Self, LoadError> {
        if self.reference().is_some() {
            self.resolver.resolve(self.id, &self.pointer)
        } else {
            Ok(self.clone())
        }
    }

    /// Raw child by object key or array index, without following references.
    #[must_use]
    pub fn child(&self, key: &str) -> Option<Self> {
        let pointer = format!("{}/{}", self.pointer, escape_token(key));
        self.file.root.pointer(&pointer)?;
        Some(Self {
            resolver: self.resolver,
            file: Rc::clone(&self.file),
            id: self.id,
            pointer,
        })
    }

    /// Resolved child by key.
    ///
    /// # Errors
    ///
    /// Returns the resolver's error for a broken reference.
    pub fn get(&self, key: &str) -> Result<Option<Self>, LoadError> {
        self.child(key).map(|c| c.resolve()).transpose()
    }

    /// Resolved `(key, node)` pairs of an object node, in document order.
    ///
    /// # Errors
    ///
    /// Returns the resolver's error for a broken reference.
    pub fn entries(&self) -> Result<Vec<(String, Self)>, LoadError> {
        let Some(object) = self.value().as_object() else {
            return Ok(Vec::new());
        };
        object
            .keys()
            .filter_map(|key| self.child(key).map(|c| (key.clone(), c)))
            .map(|(key, child)| child.resolve().map(|node| (key, node)))
            .collect()
    }

    /// Resolved elements of an array node.
    ///
    /// # Errors
    ///
    /// Returns the resolver's error for a broken reference.
    pub fn items(&self) -> Result<Vec<Self>, LoadError> {
        let len = self.value().as_array().map_or(0, Vec::len);
        (0..len)
            .filter_map(|i| self.child(&i.to_string()))
            .map(|child| child.resolve())
            .collect()
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.value().as_str()
    }

    /// Boolean field of this object node (`required`, `readOnly`, ...).
    #[must_use]
    pub fn flag(&self, key: &str) -> bool {
        self.value().get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    #[must_use]
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.value().get(key).and_then(Value::as_str)
    }
}
