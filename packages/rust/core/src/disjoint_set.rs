//! Disjoint-set (union-find) over ingestion indices.
//!
//! Owned by a single grouping call; never shared across runs.

/// Union by rank with path compression.
#[derive(Debug, Clone)]
pub struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    /// Create `n` singleton sets `{0}, {1}, .., {n-1}`.
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Representative of the set containing `x`.
    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }

        // Path compression
        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }

        root
    }

    /// Merge the sets containing `a` and `b`. Returns `false` if already joined.
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return false;
        }

        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] = self.rank[ra].saturating_add(1);
            }
        }
        true
    }

    pub fn connected(&mut self, a: usize, b: usize) -> bool {
        self.find(a) == self.find(b)
    }

    /// All sets as ascending index lists, ordered by their smallest member.
    pub fn components(&mut self) -> Vec<Vec<usize>> {
        let mut slot_of_root: Vec<Option<usize>> = vec![None; self.len()];
        let mut components: Vec<Vec<usize>> = Vec::new();

        for i in 0..self.len() {
            let root = self.find(i);
            match slot_of_root[root] {
                Some(slot) => components[slot].push(i),
                None => {
                    slot_of_root[root] = Some(components.len());
                    components.push(vec![i]);
                }
            }
        }

        components
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_as_singletons() {
        let mut set = DisjointSet::new(3);
        assert_eq!(set.components(), vec![vec![0], vec![1], vec![2]]);
    }

    #[test]
    fn union_is_transitive() {
        let mut set = DisjointSet::new(5);
        assert!(set.union(0, 3));
        assert!(set.union(3, 4));
        assert!(!set.union(0, 4));
        assert!(set.connected(0, 4));
        assert!(!set.connected(1, 2));
    }

    #[test]
    fn components_are_sorted_by_first_member() {
        let mut set = DisjointSet::new(6);
        set.union(5, 1);
        set.union(4, 2);
        set.union(2, 0);
        assert_eq!(set.components(), vec![vec![0, 2, 4], vec![1, 5], vec![3]]);
    }

    #[test]
    fn empty_set_has_no_components() {
        let mut set = DisjointSet::new(0);
        assert!(set.is_empty());
        assert!(set.components().is_empty());
    }
}
