/// PEG matching primitives shared by the block, inline and HTML grammars.
///
/// A [`Matcher`] is a byte cursor over the text being parsed. Grammar rule
/// sets implement [`Grammar`] to get the PEG operators (sequence with
/// backtracking, ordered choice, repetition, lookahead) as default methods.
/// A rule is any function from the grammar to `Option<T>`: `None` is the
/// local "no match" signal and never escapes to the caller of the parser.
#[derive(Debug, Clone)]
pub struct Matcher<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Matcher<'a> {
    pub fn new(input: &'a str) -> Self {
        Matcher { input, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Move the cursor back to a position saved earlier with [`Matcher::pos`].
    pub fn reset(&mut self, pos: usize) {
        debug_assert!(self.input.is_char_boundary(pos));
        self.pos = pos;
    }

    pub fn advance(&mut self, bytes: usize) {
        self.pos = (self.pos + bytes).min(self.input.len());
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Unconsumed input.
    pub fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    /// Text consumed since `start`.
    pub fn since(&self, start: usize) -> &'a str {
        &self.input[start..self.pos]
    }

    pub fn slice(&self, start: usize, end: usize) -> &'a str {
        &self.input[start..end]
    }

    pub fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    /// The character just before the cursor, `None` at the start of input.
    pub fn prev_char(&self) -> Option<char> {
        self.input[..self.pos].chars().next_back()
    }

    pub fn starts_with(&self, literal: &str) -> bool {
        self.rest().starts_with(literal)
    }

    pub fn literal(&mut self, literal: &str) -> bool {
        if self.starts_with(literal) {
            self.pos += literal.len();
            true
        } else {
            false
        }
    }

    pub fn char_if(&mut self, pred: impl Fn(char) -> bool) -> Option<char> {
        let c = self.peek().filter(|&c| pred(c))?;
        self.pos += c.len_utf8();
        Some(c)
    }

    pub fn one_of(&mut self, set: &str) -> Option<char> {
        self.char_if(|c| set.contains(c))
    }

    pub fn any_char(&mut self) -> Option<char> {
        self.char_if(|_| true)
    }

    /// Consume characters while `pred` holds, returning how many were consumed.
    pub fn skip_while(&mut self, pred: impl Fn(char) -> bool) -> usize {
        let mut count = 0;
        while self.char_if(&pred).is_some() {
            count += 1;
        }
        count
    }
}

/// A grammar rule referenced by name, e.g. `Self::paragraph`.
pub type Rule<G, T> = fn(&mut G) -> Option<T>;

/// PEG operators over a rule set that owns a [`Matcher`].
///
/// Every combinator leaves the cursor untouched when it fails, so rules can
/// be freely composed with `?` without partial side effects.
pub trait Grammar<'a>: Sized {
    fn matcher(&mut self) -> &mut Matcher<'a>;

    /// Sequence: run `rule`, restoring the cursor if it fails.
    fn attempt<T>(&mut self, rule: impl FnOnce(&mut Self) -> Option<T>) -> Option<T> {
        let start = self.matcher().pos();
        let result = rule(self);
        if result.is_none() {
            self.matcher().reset(start);
        }
        result
    }

    /// Ordered choice: the first alternative that matches wins.
    fn choice<T>(&mut self, alternatives: &[Rule<Self, T>]) -> Option<T> {
        alternatives.iter().find_map(|alt| self.attempt(*alt))
    }

    /// Zero or more repetitions.
    ///
    /// A repetition that succeeds without consuming input ends the loop and
    /// is discarded, so no rule can spin in place.
    fn many<T>(&mut self, mut rule: impl FnMut(&mut Self) -> Option<T>) -> Vec<T> {
        let mut items = Vec::new();
        loop {
            let start = self.matcher().pos();
            match self.attempt(&mut rule) {
                Some(item) if self.matcher().pos() > start => items.push(item),
                Some(_) => {
                    self.matcher().reset(start);
                    break;
                }
                None => break,
            }
        }
        items
    }

    /// One or more repetitions.
    fn many1<T>(&mut self, rule: impl FnMut(&mut Self) -> Option<T>) -> Option<Vec<T>> {
        let items = self.many(rule);
        (!items.is_empty()).then_some(items)
    }

    /// Like [`Grammar::many`] but only counts the matches.
    fn skip_many<T>(&mut self, rule: impl FnMut(&mut Self) -> Option<T>) -> usize {
        self.many(rule).len()
    }

    /// `e?`: always succeeds, the inner result tells whether `e` matched.
    fn optional<T>(&mut self, rule: impl FnOnce(&mut Self) -> Option<T>) -> Option<T> {
        self.attempt(rule)
    }

    /// `&e`: zero-width positive lookahead.
    fn followed_by<T>(&mut self, rule: impl FnOnce(&mut Self) -> Option<T>) -> Option<()> {
        let start = self.matcher().pos();
        let matched = rule(self).is_some();
        self.matcher().reset(start);
        matched.then_some(())
    }

    /// `!e`: zero-width negative lookahead.
    fn not_followed_by<T>(&mut self, rule: impl FnOnce(&mut Self) -> Option<T>) -> Option<()> {
        match self.followed_by(rule) {
            Some(()) => None,
            None => Some(()),
        }
    }

    /// `< e >`: the text matched by `rule` along with its result.
    fn capture<T>(&mut self, rule: impl FnOnce(&mut Self) -> Option<T>) -> Option<(&'a str, T)> {
        let start = self.matcher().pos();
        let value = self.attempt(rule)?;
        Some((self.matcher().since(start), value))
    }

    fn lit(&mut self, literal: &str) -> Option<()> {
        self.matcher().literal(literal).then_some(())
    }
}
