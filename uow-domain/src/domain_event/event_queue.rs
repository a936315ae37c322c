use std::slice::Iter;

/// 实体上待发布的领域事件队列
///
/// 保持事件产生的先后顺序；`take` 一次性取走全部事件并清空队列，
/// 因此同一事件不会被收集两次。
#[derive(Debug, Clone, PartialEq)]
pub struct EventQueue<E> {
    events: Vec<E>,
}

impl<E> Default for EventQueue<E> {
    fn default() -> Self {
        Self { events: Vec::new() }
    }
}

impl<E> EventQueue<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个事件
    pub fn raise(&mut self, event: E) {
        self.events.push(event);
    }

    /// 取走全部事件，队列随即为空
    pub fn take(&mut self) -> Vec<E> {
        std::mem::take(&mut self.events)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn as_slice(&self) -> &[E] {
        &self.events
    }

    pub fn iter(&self) -> Iter<'_, E> {
        self.events.iter()
    }
}

impl<'a, E> IntoIterator for &'a EventQueue<E> {
    type Item = &'a E;
    type IntoIter = Iter<'a, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}
