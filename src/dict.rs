use crate::cell::*;
use crate::error::*;

/// What happens when a word is dispatched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Behavior {
    Native(XfnPtr),
    // call compiled code at body
    Enter,
    // push body address
    DoVar,
    // push the cell at body
    DoVal,
    // add the cell at body to the top of the stack
    DoAdd,
    // push body address, then run the defining word's code
    DoDoes { code: usize },
}

impl Behavior {
    pub fn kind(&self) -> Xint {
        match self {
            Behavior::Native(_) => 0,
            Behavior::Enter => 1,
            Behavior::DoVar => 2,
            Behavior::DoVal => 3,
            Behavior::DoAdd => 4,
            Behavior::DoDoes { .. } => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordList {
    Normal,
    Macro,
    Hidden,
}

impl Default for WordList {
    fn default() -> Self {
        WordList::Normal
    }
}

#[derive(Debug, Clone)]
pub struct Word {
    pub name: Xstr,
    // NUL terminated copy of the name in memory
    pub name_addr: Xint,
    pub prev: usize,
    pub subs: usize,
    pub behavior: Behavior,
    pub body: Xint,
}

/// Word table indexed by execution token. Token 0 is reserved and means
/// "not found".
#[derive(Clone, Default)]
pub struct Dictionary {
    words: Vec<Word>,
    normal: usize,
    macros: usize,
    hidden: usize,
    current: WordList,
    capacity: usize,
}

impl Dictionary {
    pub fn new(capacity: usize) -> Self {
        let null = Word {
            name: Xstr::default(),
            name_addr: 0,
            prev: 0,
            subs: 0,
            behavior: Behavior::Enter,
            body: 0,
        };
        Self {
            words: vec![null],
            capacity,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_full(&self) -> bool {
        self.words.len() >= self.capacity
    }

    pub fn word(&self, xt: usize) -> Xresult1<&Word> {
        match self.words.get(xt) {
            Some(w) if xt != 0 => Ok(w),
            _ => Err(Xerr::InvalidToken(xt as Xint)),
        }
    }

    pub fn word_mut(&mut self, xt: usize) -> Xresult1<&mut Word> {
        match self.words.get_mut(xt) {
            Some(w) if xt != 0 => Ok(w),
            _ => Err(Xerr::InvalidToken(xt as Xint)),
        }
    }

    pub fn head(&self, list: WordList) -> usize {
        match list {
            WordList::Normal => self.normal,
            WordList::Macro => self.macros,
            WordList::Hidden => self.hidden,
        }
    }

    pub fn set_head(&mut self, list: WordList, xt: usize) {
        match list {
            WordList::Normal => self.normal = xt,
            WordList::Macro => self.macros = xt,
            WordList::Hidden => self.hidden = xt,
        }
    }

    pub fn current(&self) -> WordList {
        self.current
    }

    pub fn set_current(&mut self, list: WordList) {
        self.current = list;
    }

    /// Link a new word on top of `list`.
    pub fn insert(
        &mut self,
        list: WordList,
        name: Xstr,
        name_addr: Xint,
        behavior: Behavior,
        body: Xint,
    ) -> Xresult1<usize> {
        if self.is_full() {
            return Err(Xerr::TokenSpaceExhausted);
        }
        let xt = self.words.len();
        self.words.push(Word {
            name,
            name_addr,
            prev: self.head(list),
            subs: xt,
            behavior,
            body,
        });
        self.set_head(list, xt);
        Ok(xt)
    }

    fn scan(&self, mut w: usize, name: &[u8]) -> usize {
        while w != 0 && self.words[w].name.as_bytes() != name {
            w = self.words[w].prev;
        }
        w
    }

    // walk the sub-list of `outer` without running into `outer` itself
    fn scan_subs(&self, outer: usize, name: &[u8]) -> usize {
        let mut s = self.words[outer].subs;
        while s != 0 && s != outer && self.words[s].name.as_bytes() != name {
            s = self.words[s].prev;
        }
        if s == outer {
            0
        } else {
            s
        }
    }

    /// Find `name` or `outer:inner` starting from the list head `head`.
    pub fn find(&self, head: usize, name: &[u8]) -> usize {
        if name.is_empty() || head >= self.words.len() {
            return 0;
        }
        match memchr::memchr(b':', name) {
            Some(i) if i > 0 && i + 1 < name.len() => {
                let outer = self.scan(head, &name[..i]);
                if outer == 0 {
                    0
                } else {
                    self.scan_subs(outer, &name[i + 1..])
                }
            }
            _ => self.scan(head, name),
        }
    }

    /// Resolve `object.method`, returning both tokens or zeros.
    pub fn findpair(&self, head: usize, name: &[u8]) -> (usize, usize) {
        if head >= self.words.len() {
            return (0, 0);
        }
        match memchr::memchr(b'.', name) {
            Some(i) if i > 0 => {
                let outer = self.scan(head, &name[..i]);
                if outer == 0 {
                    return (0, 0);
                }
                match self.scan_subs(outer, &name[i + 1..]) {
                    0 => (0, 0),
                    inner => (outer, inner),
                }
            }
            _ => (0, 0),
        }
    }

    /// Turn the words defined on `list` after `xt` into the sub-list of `xt`.
    pub fn adopt(&mut self, list: WordList, xt: usize) {
        let top = self.head(list);
        if top != xt {
            self.words[xt].subs = top;
        }
        self.set_head(list, xt);
    }

    /// Close the scope of a colon definition created on `list`. The normal
    /// words of its body become its sub-list, macro words of the body are
    /// dropped.
    pub fn close_definition(&mut self, xt: usize, list: WordList, normal_mark: usize, macro_mark: usize) {
        if list == WordList::Normal {
            self.adopt(WordList::Normal, xt);
        } else {
            let top = self.normal;
            if top != normal_mark {
                let mut w = top;
                while w != 0 && self.words[w].prev != normal_mark {
                    w = self.words[w].prev;
                }
                if w != 0 {
                    self.words[w].prev = xt;
                }
                self.words[xt].subs = top;
            }
            self.normal = normal_mark;
        }
        self.macros = if list == WordList::Macro { xt } else { macro_mark };
        self.current = list;
    }

    /// Forget a definition that never completed.
    pub fn unlink(&mut self, list: WordList, normal_mark: usize, macro_mark: usize) {
        self.normal = normal_mark;
        self.macros = macro_mark;
        self.current = list;
    }

    /// Names visible through `list`, most recent first.
    pub fn names(&self, list: WordList) -> Vec<Xstr> {
        let mut v = Vec::new();
        let mut w = self.head(list);
        while w != 0 {
            v.push(self.words[w].name.clone());
            w = self.words[w].prev;
        }
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(d: &mut Dictionary, list: WordList, name: &str) -> usize {
        d.insert(list, Xstr::from(name), 0, Behavior::Enter, 0).unwrap()
    }

    #[test]
    fn test_find() {
        let mut d = Dictionary::new(16);
        let dup = add(&mut d, WordList::Normal, "dup");
        let dup2 = add(&mut d, WordList::Normal, "dup2");
        let colon = add(&mut d, WordList::Macro, ":");
        let head = d.head(WordList::Normal);
        assert_eq!(dup, d.find(head, b"dup"));
        assert_eq!(dup2, d.find(head, b"dup2"));
        assert_eq!(0, d.find(head, b"du"));
        assert_eq!(0, d.find(head, b""));
        assert_eq!(0, d.find(head, b":"));
        assert_eq!(colon, d.find(d.head(WordList::Macro), b":"));
        // shadowing
        let dup3 = add(&mut d, WordList::Normal, "dup");
        assert_eq!(dup3, d.find(d.head(WordList::Normal), b"dup"));
        assert_eq!(Err(Xerr::InvalidToken(0)), d.word(0).map(|_| ()));
    }

    #[test]
    fn test_namespaces() {
        let mut d = Dictionary::new(16);
        let base = add(&mut d, WordList::Normal, "base");
        let mark = d.head(WordList::Macro);
        let outer = add(&mut d, WordList::Normal, "outer");
        let inner = add(&mut d, WordList::Normal, "inner");
        assert_eq!(inner, d.find(d.head(WordList::Normal), b"inner"));
        d.close_definition(outer, WordList::Normal, 0, mark);
        let head = d.head(WordList::Normal);
        assert_eq!(outer, head);
        assert_eq!(0, d.find(head, b"inner"));
        assert_eq!(inner, d.find(head, b"outer:inner"));
        assert_eq!(0, d.find(head, b"outer:base"));
        assert_eq!(0, d.find(head, b"base:inner"));
        assert_eq!(base, d.find(head, b"base"));
        assert_eq!((outer, inner), d.findpair(head, b"outer.inner"));
        assert_eq!((0, 0), d.findpair(head, b"outer.base"));
        assert_eq!((0, 0), d.findpair(head, b".inner"));
        assert_eq!((0, 0), d.findpair(head, b"outer"));
    }

    #[test]
    fn test_macro_definition_scope() {
        let mut d = Dictionary::new(16);
        add(&mut d, WordList::Normal, "base");
        let normal_mark = d.head(WordList::Normal);
        let macro_mark = d.head(WordList::Macro);
        let m = add(&mut d, WordList::Macro, "m");
        let helper = add(&mut d, WordList::Normal, "helper");
        add(&mut d, WordList::Macro, "local-macro");
        d.close_definition(m, WordList::Macro, normal_mark, macro_mark);
        assert_eq!(m, d.head(WordList::Macro));
        assert_eq!(normal_mark, d.head(WordList::Normal));
        assert_eq!(0, d.find(d.head(WordList::Macro), b"local-macro"));
        assert_eq!(helper, d.find(d.head(WordList::Macro), b"m:helper"));
        assert_eq!(WordList::Macro, d.current());
    }

    #[test]
    fn test_capacity() {
        let mut d = Dictionary::new(3);
        add(&mut d, WordList::Normal, "a");
        add(&mut d, WordList::Normal, "b");
        let r = d.insert(WordList::Normal, Xstr::from("c"), 0, Behavior::Enter, 0);
        assert_eq!(Err(Xerr::TokenSpaceExhausted), r);
        let names: Vec<String> = d.names(WordList::Normal).iter().map(|s| s.to_string()).collect();
        assert_eq!(vec!["b".to_string(), "a".to_string()], names);
    }
}
