//! The variable store: call frames, scalar and array variables, upvar
//! links, variable traces, and array search cursors.
//!
//! Each call frame is a `Scope`: a name-keyed map of `Var` records.  Frame 0
//! is the global scope and is never popped; procedure invocations push and
//! pop frames above it.
//!
//! Aliasing (`global`, `upvar`) is represented by `VarValue::Link` records
//! holding a (level, name) pair.  Links are flattened at creation so they
//! never chain, and every access re-resolves the link through the map; no
//! raw references to variable records survive across a callback, which keeps
//! re-entrant trace callbacks safe.
//!
//! Trace callbacks themselves are dispatched by the interpreter (they need
//! `&mut Interp`); this module stores the trace records, enforces the
//! per-variable re-entrancy guard, and defers record removal while a trace
//! on the record is still active.

use crate::types::*;
use crate::value::Value;
use indexmap::IndexMap;
use std::rc::Rc;

/// A registered variable trace.
pub(crate) struct VarTrace {
    pub(crate) id: usize,
    pub(crate) mask: u8,
    pub(crate) elem: Option<String>,
    pub(crate) func: Rc<VarTraceFn>,
    /// The script form of the trace command, when registered from script
    /// level; used by `trace vdelete` and `trace vinfo`.
    pub(crate) script: Option<Value>,
}

/// An array search cursor: a snapshot of the array's indices in insertion
/// order.  Snapshotting (rather than pointing into the live table) is what
/// lets the store mutate freely while searches are outstanding.
struct ArraySearch {
    id: String,
    keys: Vec<String>,
    pos: usize,
}

type ElemMap = IndexMap<String, Value, TaclHasher>;

enum VarValue {
    /// A record held alive by traces or an active trace callback, but with
    /// no value; reads report "no such variable".
    Undefined,
    Scalar(Value),
    Array(ElemMap),
    /// An alias created by `global`/`upvar`: redirects to the variable
    /// `name` in frame `level`.  Never chains.
    Link { level: usize, name: String },
}

struct Var {
    value: VarValue,
    traces: Vec<Rc<VarTrace>>,
    /// Nonzero while a trace on this variable is being dispatched; guards
    /// against re-entrant firing and defers removal.
    trace_depth: u32,
    searches: Vec<ArraySearch>,
}

impl Var {
    fn new(value: VarValue) -> Self {
        Self {
            value,
            traces: Vec::new(),
            trace_depth: 0,
            searches: Vec::new(),
        }
    }

    fn is_defined(&self) -> bool {
        matches!(self.value, VarValue::Scalar(_) | VarValue::Array(_))
    }

    fn is_link(&self) -> bool {
        matches!(self.value, VarValue::Link { .. })
    }
}

#[derive(Default)]
struct Scope {
    map: IndexMap<String, Var, TaclHasher>,
}

/// The stack of variable scopes.  Level 0 is the global scope.
pub(crate) struct ScopeStack {
    stack: Vec<Scope>,
    next_trace_id: usize,
    next_search_id: usize,
}

fn err(msg: String) -> Exception {
    Exception::tacl_err(Value::from(msg))
}

impl ScopeStack {
    pub(crate) fn new() -> Self {
        Self {
            stack: vec![Scope::default()],
            next_trace_id: 1,
            next_search_id: 1,
        }
    }

    /// The current scope level; the global scope is level 0.
    pub(crate) fn current(&self) -> usize {
        self.stack.len() - 1
    }

    pub(crate) fn push(&mut self) {
        self.stack.push(Scope::default());
    }

    pub(crate) fn pop(&mut self) {
        assert!(self.stack.len() > 1, "cannot pop the global scope");
        self.stack.pop();
    }

    /// Resolves a name in the current scope to its owning (level, name)
    /// pair, following at most one link.
    fn resolve(&self, name: &str) -> (usize, String) {
        let level = self.current();
        if let Some(var) = self.stack[level].map.get(name) {
            if let VarValue::Link { level, name } = &var.value {
                return (*level, name.clone());
            }
        }
        (level, name.to_string())
    }

    fn var(&self, level: usize, name: &str) -> Option<&Var> {
        self.stack[level].map.get(name)
    }

    fn var_mut(&mut self, level: usize, name: &str) -> Option<&mut Var> {
        self.stack[level].map.get_mut(name)
    }

    //--------------------------------------------------------------------------------------------
    // Scalar access

    /// Gets the value of a scalar variable in the current scope.
    pub(crate) fn get(&self, name: &str) -> TaclResult {
        let (level, target) = self.resolve(name);
        match self.var(level, &target).map(|var| &var.value) {
            Some(VarValue::Scalar(value)) => Ok(value.clone()),
            Some(VarValue::Array(_)) => {
                Err(err(format!("can't read \"{}\": variable is array", name)))
            }
            _ => Err(err(format!("can't read \"{}\": no such variable", name))),
        }
    }

    /// Sets a scalar variable in the current scope, creating it if needed.
    /// With `append`, the value is appended to the variable's current value;
    /// the payload grows in place and the record never moves.
    pub(crate) fn set(&mut self, name: &str, value: Value, append: bool) -> Result<(), Exception> {
        let (level, target) = self.resolve(name);
        match self.stack[level].map.get_mut(&target) {
            None => {
                self.stack[level]
                    .map
                    .insert(target, Var::new(VarValue::Scalar(value)));
            }
            Some(var) => match &mut var.value {
                VarValue::Array(_) => {
                    return Err(err(format!("can't set \"{}\": variable is array", name)));
                }
                VarValue::Scalar(old) if append => {
                    let mut grown = String::with_capacity(old.as_str().len() + value.as_str().len());
                    grown.push_str(old.as_str());
                    grown.push_str(value.as_str());
                    var.value = VarValue::Scalar(Value::from(grown));
                }
                _ => var.value = VarValue::Scalar(value),
            },
        }
        Ok(())
    }

    /// Sets a variable directly in the global scope; used to mirror
    /// `errorInfo` and `errorCode`.
    pub(crate) fn set_global(&mut self, name: &str, value: Value) {
        match self.stack[0].map.get_mut(name) {
            Some(var) if !var.is_link() => var.value = VarValue::Scalar(value),
            Some(_) | None => {
                self.stack[0]
                    .map
                    .insert(name.to_string(), Var::new(VarValue::Scalar(value)));
            }
        }
    }

    //--------------------------------------------------------------------------------------------
    // Array element access

    /// Gets the value of an array element in the current scope.
    pub(crate) fn get_elem(&self, name: &str, index: &str) -> TaclResult {
        let (level, target) = self.resolve(name);
        match self.var(level, &target).map(|var| &var.value) {
            Some(VarValue::Array(map)) => match map.get(index) {
                Some(value) => Ok(value.clone()),
                None => Err(err(format!(
                    "can't read \"{}({})\": no such element in array",
                    name, index
                ))),
            },
            Some(VarValue::Scalar(_)) => Err(err(format!(
                "can't read \"{}({})\": variable isn't array",
                name, index
            ))),
            _ => Err(err(format!(
                "can't read \"{}({})\": no such variable",
                name, index
            ))),
        }
    }

    /// Sets an array element in the current scope, creating the array if
    /// needed.
    pub(crate) fn set_elem(
        &mut self,
        name: &str,
        index: &str,
        value: Value,
        append: bool,
    ) -> Result<(), Exception> {
        let (level, target) = self.resolve(name);
        let var = self
            .stack[level]
            .map
            .entry(target)
            .or_insert_with(|| Var::new(VarValue::Array(ElemMap::default())));

        if let VarValue::Undefined = var.value {
            var.value = VarValue::Array(ElemMap::default());
        }

        match &mut var.value {
            VarValue::Array(map) => {
                match map.get_mut(index) {
                    Some(old) if append => {
                        let mut grown =
                            String::with_capacity(old.as_str().len() + value.as_str().len());
                        grown.push_str(old.as_str());
                        grown.push_str(value.as_str());
                        *old = Value::from(grown);
                    }
                    _ => {
                        map.insert(index.to_string(), value);
                    }
                }
                Ok(())
            }
            _ => Err(err(format!(
                "can't set \"{}({})\": variable isn't array",
                name, index
            ))),
        }
    }

    //--------------------------------------------------------------------------------------------
    // Existence and removal

    pub(crate) fn exists(&self, name: &str) -> bool {
        let (level, target) = self.resolve(name);
        self.var(level, &target)
            .map(Var::is_defined)
            .unwrap_or(false)
    }

    pub(crate) fn elem_exists(&self, name: &str, index: &str) -> bool {
        let (level, target) = self.resolve(name);
        match self.var(level, &target).map(|var| &var.value) {
            Some(VarValue::Array(map)) => map.contains_key(index),
            _ => false,
        }
    }

    /// Removes a variable from the current scope.  If a trace on the record
    /// is currently being dispatched, or array searches are outstanding, the
    /// record is marked undefined instead of being removed, so the active
    /// callbacks stay valid.  Returns true if the variable was defined.
    pub(crate) fn unset(&mut self, name: &str) -> bool {
        let (level, target) = self.resolve(name);
        match self.stack[level].map.get_mut(&target) {
            None => false,
            Some(var) => {
                let was_defined = var.is_defined();
                if var.trace_depth > 0 || !var.searches.is_empty() {
                    var.value = VarValue::Undefined;
                } else {
                    self.stack[level].map.shift_remove(&target);
                }
                was_defined
            }
        }
    }

    /// Removes one element from an array.  Returns true if it existed.
    pub(crate) fn unset_element(&mut self, name: &str, index: &str) -> bool {
        let (level, target) = self.resolve(name);
        match self.var_mut(level, &target) {
            Some(var) => match &mut var.value {
                VarValue::Array(map) => map.shift_remove(index).is_some(),
                _ => false,
            },
            None => false,
        }
    }

    //--------------------------------------------------------------------------------------------
    // Upvar links

    /// Creates `myname` in the current scope as an alias for `other` in the
    /// frame at `level`.  If the target is itself an alias the link is
    /// flattened, so links never chain.
    pub(crate) fn upvar(
        &mut self,
        level: usize,
        other: &str,
        myname: &str,
    ) -> Result<(), Exception> {
        if level > self.current() {
            return Err(err(format!("bad level \"#{}\"", level)));
        }

        let (tlevel, tname) = match self.var(level, other).map(|var| &var.value) {
            Some(VarValue::Link { level, name }) => (*level, name.clone()),
            _ => (level, other.to_string()),
        };

        if tlevel == self.current() && tname == myname {
            return Err(err(format!(
                "can't upvar from variable to itself: \"{}\"",
                myname
            )));
        }

        let current = self.current();
        match self.stack[current].map.get_mut(myname) {
            Some(var) if var.is_link() || !var.is_defined() => {
                var.value = VarValue::Link {
                    level: tlevel,
                    name: tname,
                };
            }
            Some(_) => {
                return Err(err(format!("variable \"{}\" already exists", myname)));
            }
            None => {
                self.stack[current].map.insert(
                    myname.to_string(),
                    Var::new(VarValue::Link {
                        level: tlevel,
                        name: tname,
                    }),
                );
            }
        }

        Ok(())
    }

    //--------------------------------------------------------------------------------------------
    // Name listings

    /// Names visible in the current scope, including aliases.
    pub(crate) fn vars_in_scope(&self) -> TaclList {
        let level = self.current();
        self.stack[level]
            .map
            .iter()
            .filter(|(_, var)| var.is_defined() || var.is_link())
            .map(|(name, _)| Value::from(name))
            .collect()
    }

    /// Names defined in the global scope.
    pub(crate) fn vars_in_global_scope(&self) -> TaclList {
        self.stack[0]
            .map
            .iter()
            .filter(|(_, var)| var.is_defined())
            .map(|(name, _)| Value::from(name))
            .collect()
    }

    /// Names defined locally in the current scope: no aliases, and nothing
    /// when the current scope is the global one.
    pub(crate) fn vars_in_local_scope(&self) -> TaclList {
        if self.current() == 0 {
            return TaclList::new();
        }
        let level = self.current();
        self.stack[level]
            .map
            .iter()
            .filter(|(_, var)| var.is_defined() && !var.is_link())
            .map(|(name, _)| Value::from(name))
            .collect()
    }

    //--------------------------------------------------------------------------------------------
    // Array operations

    pub(crate) fn array_exists(&self, name: &str) -> bool {
        let (level, target) = self.resolve(name);
        matches!(
            self.var(level, &target).map(|var| &var.value),
            Some(VarValue::Array(_))
        )
    }

    /// The array's indices and values as a flat list, in insertion order.
    pub(crate) fn array_get(&self, name: &str) -> TaclList {
        let (level, target) = self.resolve(name);
        match self.var(level, &target).map(|var| &var.value) {
            Some(VarValue::Array(map)) => {
                let mut list = TaclList::with_capacity(map.len() * 2);
                for (key, value) in map {
                    list.push(Value::from(key));
                    list.push(value.clone());
                }
                list
            }
            _ => TaclList::new(),
        }
    }

    /// The array's indices, in insertion order.
    pub(crate) fn array_indices(&self, name: &str) -> TaclList {
        let (level, target) = self.resolve(name);
        match self.var(level, &target).map(|var| &var.value) {
            Some(VarValue::Array(map)) => map.keys().map(Value::from).collect(),
            _ => TaclList::new(),
        }
    }

    pub(crate) fn array_size(&self, name: &str) -> usize {
        let (level, target) = self.resolve(name);
        match self.var(level, &target).map(|var| &var.value) {
            Some(VarValue::Array(map)) => map.len(),
            _ => 0,
        }
    }

    //--------------------------------------------------------------------------------------------
    // Array searches

    /// Starts a search over the array's indices and returns the search id.
    pub(crate) fn array_start_search(&mut self, name: &str) -> Result<Value, Exception> {
        let (level, target) = self.resolve(name);
        let id = format!("s{}-{}", self.next_search_id, name);
        self.next_search_id += 1;

        match self.var_mut(level, &target) {
            Some(var) => match &var.value {
                VarValue::Array(map) => {
                    let keys = map.keys().cloned().collect();
                    var.searches.push(ArraySearch {
                        id: id.clone(),
                        keys,
                        pos: 0,
                    });
                    Ok(Value::from(id))
                }
                _ => Err(err(format!("\"{}\" isn't an array", name))),
            },
            None => Err(err(format!("\"{}\" isn't an array", name))),
        }
    }

    fn search_mut(&mut self, name: &str, id: &str) -> Result<&mut ArraySearch, Exception> {
        let (level, target) = self.resolve(name);
        match self.var_mut(level, &target) {
            Some(var) if matches!(var.value, VarValue::Array(_)) => var
                .searches
                .iter_mut()
                .find(|search| search.id == id)
                .ok_or_else(|| err(format!("couldn't find search \"{}\"", id))),
            _ => Err(err(format!("\"{}\" isn't an array", name))),
        }
    }

    /// True if the search has indices left to return.
    pub(crate) fn search_anymore(&mut self, name: &str, id: &str) -> Result<bool, Exception> {
        let search = self.search_mut(name, id)?;
        Ok(search.pos < search.keys.len())
    }

    /// The next index in the search, or the empty value when exhausted.
    pub(crate) fn search_next(&mut self, name: &str, id: &str) -> Result<Value, Exception> {
        let search = self.search_mut(name, id)?;
        if search.pos < search.keys.len() {
            let key = search.keys[search.pos].clone();
            search.pos += 1;
            Ok(Value::from(key))
        } else {
            Ok(Value::empty())
        }
    }

    /// Ends the search, invalidating its id.
    pub(crate) fn search_done(&mut self, name: &str, id: &str) -> Result<(), Exception> {
        self.search_mut(name, id)?;
        let (level, target) = self.resolve(name);
        if let Some(var) = self.var_mut(level, &target) {
            var.searches.retain(|search| search.id != id);
        }
        Ok(())
    }

    //--------------------------------------------------------------------------------------------
    // Variable traces

    /// Registers a trace on the variable (creating an undefined record if
    /// the variable doesn't exist yet) and returns the trace id.
    pub(crate) fn add_trace(
        &mut self,
        name: &str,
        elem: Option<String>,
        mask: u8,
        func: Rc<VarTraceFn>,
        script: Option<Value>,
    ) -> usize {
        let (level, target) = self.resolve(name);
        let id = self.next_trace_id;
        self.next_trace_id += 1;

        let var = self
            .stack[level]
            .map
            .entry(target)
            .or_insert_with(|| Var::new(VarValue::Undefined));
        var.traces.push(Rc::new(VarTrace {
            id,
            mask,
            elem,
            func,
            script,
        }));
        id
    }

    /// Removes the most recently added trace matching the given mask and
    /// script form.  Returns true if one was removed.
    pub(crate) fn remove_trace_matching(&mut self, name: &str, mask: u8, script: &Value) -> bool {
        let (level, target) = self.resolve(name);
        if let Some(var) = self.var_mut(level, &target) {
            if let Some(pos) = var
                .traces
                .iter()
                .rposition(|tr| tr.mask == mask && tr.script.as_ref() == Some(script))
            {
                var.traces.remove(pos);
                return true;
            }
        }
        false
    }

    /// Removes a trace by id.  Returns true if it existed.
    pub(crate) fn remove_trace_id(&mut self, name: &str, id: usize) -> bool {
        let (level, target) = self.resolve(name);
        if let Some(var) = self.var_mut(level, &target) {
            let before = var.traces.len();
            var.traces.retain(|tr| tr.id != id);
            return var.traces.len() != before;
        }
        false
    }

    /// The traces on a variable, most recent first, as (mask, script) pairs.
    pub(crate) fn trace_info(&self, name: &str) -> Vec<(u8, Option<Value>)> {
        let (level, target) = self.resolve(name);
        match self.var(level, &target) {
            Some(var) => var
                .traces
                .iter()
                .rev()
                .map(|tr| (tr.mask, tr.script.clone()))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Collects the traces to fire for an access, in firing order: whole-
    /// variable traces first, then traces filtered to the accessed element.
    /// Returns nothing while a trace on this variable is already being
    /// dispatched (the re-entrancy guard).
    pub(crate) fn collect_traces(
        &self,
        name: &str,
        elem: Option<&str>,
        op: TraceOp,
    ) -> Vec<Rc<VarTrace>> {
        let (level, target) = self.resolve(name);
        let Some(var) = self.var(level, &target) else {
            return Vec::new();
        };
        if var.trace_depth > 0 {
            return Vec::new();
        }

        let matching = |tr: &&Rc<VarTrace>| (tr.mask & op.mask()) != 0;
        let mut fired: Vec<Rc<VarTrace>> = var
            .traces
            .iter()
            .filter(matching)
            .filter(|tr| tr.elem.is_none())
            .cloned()
            .collect();
        if elem.is_some() {
            fired.extend(
                var.traces
                    .iter()
                    .filter(matching)
                    .filter(|tr| tr.elem.as_deref() == elem)
                    .cloned(),
            );
        }
        fired
    }

    /// Marks a trace dispatch on the variable as active.
    pub(crate) fn enter_trace(&mut self, name: &str) {
        let (level, target) = self.resolve(name);
        if let Some(var) = self.var_mut(level, &target) {
            var.trace_depth += 1;
        }
    }

    /// Marks a trace dispatch on the variable as finished.  A record whose
    /// removal was deferred during dispatch stays as an undefined record;
    /// reads keep reporting "no such variable".
    pub(crate) fn leave_trace(&mut self, name: &str) {
        let (level, target) = self.resolve(name);
        if let Some(var) = self.var_mut(level, &target) {
            var.trace_depth = var.trace_depth.saturating_sub(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_get_set() {
        let mut scopes = ScopeStack::new();
        scopes.set("a", Value::from("1"), false).unwrap();
        assert_eq!(scopes.get("a").unwrap(), Value::from("1"));

        scopes.set("a", Value::from("2"), false).unwrap();
        assert_eq!(scopes.get("a").unwrap(), Value::from("2"));

        assert_eq!(
            scopes.get("nope").unwrap_err().value().as_str(),
            "can't read \"nope\": no such variable"
        );
    }

    #[test]
    fn test_append() {
        let mut scopes = ScopeStack::new();
        scopes.set("a", Value::from("foo"), true).unwrap();
        scopes.set("a", Value::from("bar"), true).unwrap();
        assert_eq!(scopes.get("a").unwrap().as_str(), "foobar");
    }

    #[test]
    fn test_elements() {
        let mut scopes = ScopeStack::new();
        scopes.set_elem("a", "x", Value::from("1"), false).unwrap();
        assert_eq!(scopes.get_elem("a", "x").unwrap().as_str(), "1");
        assert!(scopes.elem_exists("a", "x"));
        assert!(!scopes.elem_exists("a", "y"));

        assert_eq!(
            scopes.get_elem("a", "y").unwrap_err().value().as_str(),
            "can't read \"a(y)\": no such element in array"
        );

        // Kind mismatches both ways.
        assert_eq!(
            scopes.get("a").unwrap_err().value().as_str(),
            "can't read \"a\": variable is array"
        );
        scopes.set("s", Value::from("1"), false).unwrap();
        assert_eq!(
            scopes.get_elem("s", "x").unwrap_err().value().as_str(),
            "can't read \"s(x)\": variable isn't array"
        );
        assert!(scopes.set("a", Value::from("1"), false).is_err());
        assert!(scopes
            .set_elem("s", "x", Value::from("1"), false)
            .is_err());
    }

    #[test]
    fn test_scopes_isolate() {
        let mut scopes = ScopeStack::new();
        scopes.set("a", Value::from("global"), false).unwrap();

        scopes.push();
        assert!(!scopes.exists("a"));
        scopes.set("a", Value::from("local"), false).unwrap();
        assert_eq!(scopes.get("a").unwrap().as_str(), "local");
        scopes.pop();

        assert_eq!(scopes.get("a").unwrap().as_str(), "global");
    }

    #[test]
    fn test_upvar_links() {
        let mut scopes = ScopeStack::new();
        scopes.set("g", Value::from("1"), false).unwrap();

        scopes.push();
        scopes.upvar(0, "g", "local").unwrap();
        assert_eq!(scopes.get("local").unwrap().as_str(), "1");
        scopes.set("local", Value::from("2"), false).unwrap();
        scopes.pop();

        assert_eq!(scopes.get("g").unwrap().as_str(), "2");
    }

    #[test]
    fn test_upvar_flattening() {
        let mut scopes = ScopeStack::new();
        scopes.set("g", Value::from("1"), false).unwrap();

        scopes.push(); // level 1
        scopes.upvar(0, "g", "mid").unwrap();

        scopes.push(); // level 2: alias to an alias flattens to the root
        scopes.upvar(1, "mid", "leaf").unwrap();
        scopes.set("leaf", Value::from("3"), false).unwrap();
        scopes.pop();
        scopes.pop();

        assert_eq!(scopes.get("g").unwrap().as_str(), "3");
    }

    #[test]
    fn test_unset_target_leaves_alias_dangling_safely() {
        let mut scopes = ScopeStack::new();
        scopes.set("g", Value::from("1"), false).unwrap();

        scopes.push();
        scopes.upvar(0, "g", "local").unwrap();
        // Unsetting through the alias removes the target.
        assert!(scopes.unset("local"));
        assert_eq!(
            scopes.get("local").unwrap_err().value().as_str(),
            "can't read \"local\": no such variable"
        );
        // Writing through the alias re-creates the target.
        scopes.set("local", Value::from("9"), false).unwrap();
        scopes.pop();

        assert_eq!(scopes.get("g").unwrap().as_str(), "9");
    }

    #[test]
    fn test_upvar_conflicts() {
        let mut scopes = ScopeStack::new();
        scopes.set("g", Value::from("1"), false).unwrap();
        scopes.push();
        scopes.set("x", Value::from("2"), false).unwrap();

        assert_eq!(
            scopes.upvar(0, "g", "x").unwrap_err().value().as_str(),
            "variable \"x\" already exists"
        );
        scopes.pop();

        assert!(scopes.upvar(0, "g", "g").is_err());
    }

    #[test]
    fn test_upvar_level_out_of_range() {
        let mut scopes = ScopeStack::new();
        assert_eq!(
            scopes.upvar(2, "x", "y").unwrap_err().value().as_str(),
            "bad level \"#2\""
        );
    }

    #[test]
    fn test_array_listings() {
        let mut scopes = ScopeStack::new();
        scopes.set_elem("a", "z", Value::from("1"), false).unwrap();
        scopes.set_elem("a", "y", Value::from("2"), false).unwrap();
        scopes.set_elem("a", "x", Value::from("3"), false).unwrap();

        assert!(scopes.array_exists("a"));
        assert_eq!(scopes.array_size("a"), 3);

        // Insertion order is the pinned enumeration order.
        let names: Vec<String> = scopes
            .array_indices("a")
            .iter()
            .map(|val| val.as_str().to_string())
            .collect();
        assert_eq!(names, vec!["z", "y", "x"]);

        let flat = scopes.array_get("a");
        assert_eq!(flat.len(), 6);
        assert_eq!(flat[0].as_str(), "z");
        assert_eq!(flat[1].as_str(), "1");
    }

    #[test]
    fn test_array_search() {
        let mut scopes = ScopeStack::new();
        scopes.set_elem("a", "one", Value::from("1"), false).unwrap();
        scopes.set_elem("a", "two", Value::from("2"), false).unwrap();

        let id = scopes.array_start_search("a").unwrap();
        let id = id.as_str();

        assert!(scopes.search_anymore("a", id).unwrap());
        assert_eq!(scopes.search_next("a", id).unwrap().as_str(), "one");
        assert_eq!(scopes.search_next("a", id).unwrap().as_str(), "two");
        assert!(!scopes.search_anymore("a", id).unwrap());
        assert!(scopes.search_next("a", id).unwrap().is_empty());

        scopes.search_done("a", id).unwrap();
        assert_eq!(
            scopes.search_anymore("a", id).unwrap_err().value().as_str(),
            format!("couldn't find search \"{}\"", id)
        );

        assert!(scopes.array_start_search("missing").is_err());
    }

    #[test]
    fn test_trace_records() {
        let mut scopes = ScopeStack::new();
        let func: Rc<VarTraceFn> = Rc::new(|_, _, _, _| None);
        let id = scopes.add_trace("t", None, TRACE_WRITE, func, None);

        // The trace created an undefined record: not readable, not listed.
        assert!(scopes.get("t").is_err());
        assert!(!scopes.exists("t"));

        let fired = scopes.collect_traces("t", None, TraceOp::Write);
        assert_eq!(fired.len(), 1);
        assert!(scopes.collect_traces("t", None, TraceOp::Read).is_empty());

        // The guard suppresses collection while dispatch is active.
        scopes.enter_trace("t");
        assert!(scopes.collect_traces("t", None, TraceOp::Write).is_empty());

        // Removal during dispatch defers: the record survives as undefined.
        scopes.set("t", Value::from("1"), false).unwrap();
        scopes.unset("t");
        assert!(scopes.get("t").is_err());
        assert_eq!(scopes.collect_traces("t", None, TraceOp::Write).len(), 0);
        scopes.leave_trace("t");

        assert_eq!(scopes.collect_traces("t", None, TraceOp::Write).len(), 1);
        assert!(scopes.remove_trace_id("t", id));
        assert!(scopes.collect_traces("t", None, TraceOp::Write).is_empty());
    }

    #[test]
    fn test_trace_firing_order() {
        let mut scopes = ScopeStack::new();
        let func: Rc<VarTraceFn> = Rc::new(|_, _, _, _| None);
        scopes.set_elem("a", "x", Value::from("1"), false).unwrap();

        let elem_id = scopes.add_trace(
            "a",
            Some("x".to_string()),
            TRACE_WRITE,
            Rc::clone(&func),
            None,
        );
        let whole_id = scopes.add_trace("a", None, TRACE_WRITE, func, None);

        // Whole-array traces fire before element traces, regardless of
        // registration order.
        let fired = scopes.collect_traces("a", Some("x"), TraceOp::Write);
        assert_eq!(fired.len(), 2);
        assert_eq!(fired[0].id, whole_id);
        assert_eq!(fired[1].id, elem_id);

        // A different element fires only the whole-array trace.
        let fired = scopes.collect_traces("a", Some("y"), TraceOp::Write);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].id, whole_id);
    }
}
