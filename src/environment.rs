use std::fmt;
use std::rc::Rc;

use im::{OrdMap, OrdSet};

use crate::expression::{Expression, Name};

/// The disjunctive binding of a single name.
/// Every element is a value the name might still stand for.
pub type Candidates = OrdSet<Expression>;

#[derive(Clone, Debug)]
enum Frame {
    Root,

    // Additive overlay: local bindings, then fall through to the parent.
    Scope {
        locals: OrdMap<Name, Candidates>,
        parent: Environment,
    },

    // Subtractive overlay: the hidden names are unbound here, whatever the parent says.
    Shadow {
        hidden: OrdSet<Name>,
        parent: Environment,
    },
}

/// A binding environment is a chain of frames, innermost first.
///
/// Frames are shared, never copied: `scope` and `shadow` push a new frame that reads through
/// to its parent. Cloning an environment is cheap and the clone is independent, since `bind`
/// copies the top frame on write when somebody else still holds it.
#[derive(Clone, Debug)]
pub struct Environment {
    frame: Rc<Frame>,
}

impl Default for Environment {
    fn default() -> Self {
        Environment::new()
    }
}

impl Environment {
    pub fn new() -> Environment {
        Environment {
            frame: Rc::new(Frame::Root),
        }
    }

    /// A new additive frame over this environment, with no local bindings yet.
    pub fn scope(&self) -> Environment {
        Environment {
            frame: Rc::new(Frame::Scope {
                locals: OrdMap::new(),
                parent: self.clone(),
            }),
        }
    }

    /// A new subtractive frame over this environment that hides the given names.
    pub fn shadow<I>(&self, names: I) -> Environment
    where
        I: IntoIterator<Item = Name>,
    {
        Environment {
            frame: Rc::new(Frame::Shadow {
                hidden: names.into_iter().collect(),
                parent: self.clone(),
            }),
        }
    }

    /// Binds a name in the innermost additive frame, pushing one if the top frame isn't additive.
    pub fn bind(&mut self, name: Name, candidates: Candidates) {
        if let Frame::Scope { .. } = self.frame.as_ref() {
            if let Frame::Scope { locals, .. } = Rc::make_mut(&mut self.frame) {
                locals.insert(name, candidates);
            }
            return;
        }
        let mut locals = OrdMap::new();
        locals.insert(name, candidates);
        self.frame = Rc::new(Frame::Scope {
            locals,
            parent: self.clone(),
        });
    }

    pub fn lookup(&self, name: &str) -> Option<&Candidates> {
        let mut env = self;
        loop {
            match env.frame.as_ref() {
                Frame::Root => return None,
                Frame::Scope { locals, parent } => {
                    if let Some(candidates) = locals.get(name) {
                        return Some(candidates);
                    }
                    env = parent;
                }
                Frame::Shadow { hidden, parent } => {
                    if hidden.contains(name) {
                        return None;
                    }
                    env = parent;
                }
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Resolves the whole frame chain into a single mapping.
    pub fn flatten(&self) -> OrdMap<Name, Candidates> {
        match self.frame.as_ref() {
            Frame::Root => OrdMap::new(),
            Frame::Scope { locals, parent } => locals.clone().union(parent.flatten()),
            Frame::Shadow { hidden, parent } => {
                let mut answer = parent.flatten();
                for name in hidden {
                    answer.remove(name);
                }
                answer
            }
        }
    }

    /// Builds a single-frame environment from explicit bindings.
    pub fn from_bindings<I>(bindings: I) -> Environment
    where
        I: IntoIterator<Item = (Name, Candidates)>,
    {
        let mut env = Environment::new().scope();
        for (name, candidates) in bindings {
            env.bind(name, candidates);
        }
        env
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, candidates)) in self.flatten().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "${} = {{", name)?;
            for (j, candidate) in candidates.iter().enumerate() {
                if j > 0 {
                    write!(f, " | ")?;
                }
                write!(f, "{}", candidate)?;
            }
            write!(f, "}}")?;
        }
        write!(f, "}}")
    }
}
