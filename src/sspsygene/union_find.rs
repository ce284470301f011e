// Disjoint sets over arena indexes, used for clustering source group keys
// into central genes.

#[derive(Debug, Default, Clone)]
pub struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    pub fn new() -> UnionFind {
        UnionFind {
            parent: vec![],
            rank: vec![],
        }
    }

    // add a singleton set and return its index
    pub fn make_set(&mut self) -> usize {
        let index = self.parent.len();
        self.parent.push(index);
        self.rank.push(0);
        index
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    pub fn find(&mut self, mut index: usize) -> usize {
        // path halving
        while self.parent[index] != index {
            let grandparent = self.parent[self.parent[index]];
            self.parent[index] = grandparent;
            index = grandparent;
        }
        index
    }

    // merge the sets containing a and b, returns false if they were
    // already in the same set
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let root_a = self.find(a);
        let root_b = self.find(b);

        if root_a == root_b {
            return false;
        }

        match self.rank[root_a].cmp(&self.rank[root_b]) {
            std::cmp::Ordering::Less => self.parent[root_a] = root_b,
            std::cmp::Ordering::Greater => self.parent[root_b] = root_a,
            std::cmp::Ordering::Equal => {
                self.parent[root_b] = root_a;
                self.rank[root_a] += 1;
            }
        }

        true
    }

    // the members of each set, sets ordered by their smallest member,
    // members in increasing order
    pub fn sets(&mut self) -> Vec<Vec<usize>> {
        let mut set_index_of_root: Vec<Option<usize>> = vec![None; self.len()];
        let mut sets: Vec<Vec<usize>> = vec![];

        for index in 0..self.len() {
            let root = self.find(index);
            match set_index_of_root[root] {
                Some(set_index) => sets[set_index].push(index),
                None => {
                    set_index_of_root[root] = Some(sets.len());
                    sets.push(vec![index]);
                }
            }
        }

        sets
    }
}

#[test]
fn test_union_find() {
    let mut uf = UnionFind::new();
    assert!(uf.is_empty());

    for _ in 0..6 {
        uf.make_set();
    }
    assert_eq!(uf.len(), 6);

    assert!(uf.union(4, 1));
    assert!(uf.union(1, 3));
    assert!(!uf.union(3, 4));
    assert!(uf.union(5, 2));

    assert_eq!(uf.find(3), uf.find(4));
    assert_ne!(uf.find(0), uf.find(1));

    assert_eq!(uf.sets(), vec![vec![0], vec![1, 3, 4], vec![2, 5]]);
}

#[test]
fn test_union_find_long_chain() {
    let mut uf = UnionFind::new();
    for _ in 0..1000 {
        uf.make_set();
    }
    for i in 1..1000 {
        uf.union(i - 1, i);
    }
    let root = uf.find(0);
    assert!((0..1000).all(|i| uf.find(i) == root));
    assert_eq!(uf.sets().len(), 1);
}
