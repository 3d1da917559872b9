use std::iter::Peekable;

/// Iterator adapter that tells whether an item is the last one.
pub struct IsLast<I: Iterator>(Peekable<I>);

impl<I: Iterator> IsLast<I> {
    pub fn new(iter: I) -> Self {
        Self(iter.peekable())
    }
}

impl<I: Iterator> Iterator for IsLast<I> {
    type Item = (I::Item, bool);

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.0.next()?;
        let is_last = self.0.peek().is_none();
        Some((item, is_last))
    }
}

#[cfg(test)]
mod tests {
    use super::IsLast;

    #[test]
    fn it_marks_the_last_item() {
        let items = IsLast::new([1, 2, 3].into_iter()).collect::<Vec<_>>();
        assert_eq!(items, [(1, false), (2, false), (3, true)]);
        assert_eq!(IsLast::new(std::iter::empty::<()>()).count(), 0);
    }
}
