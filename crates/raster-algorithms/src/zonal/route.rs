//! Serial routes: ordered walks over cells, stored per partition.
//!
//! A route is split into fragments, one per consecutive run of cells in
//! the same partition. A fragment that does not end the route names the
//! location of the fragment continuing it, so a route can be followed
//! across partitions without pointers.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use partitioned_array::{index_from_linear, Context, Offset, Region, Shape, ZoneElement};

/// Location of a fragment: the partition holding it and its position in
/// that partition's fragment list of the route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FragmentLocation {
    pub partition: usize,
    pub fragment: usize,
}

/// Consecutive route cells within one partition.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RouteFragment {
    cells: Vec<usize>,
    next: Option<FragmentLocation>,
}

impl RouteFragment {
    pub fn new(cells: Vec<usize>, next: Option<FragmentLocation>) -> Self {
        Self { cells, next }
    }

    /// Linear indices of the cells, local to the partition, in route order.
    pub fn cells(&self) -> &[usize] {
        &self.cells
    }

    pub fn nr_cells(&self) -> usize {
        self.cells.len()
    }

    /// Fragment continuing the route, `None` for the last one.
    pub fn next(&self) -> Option<FragmentLocation> {
        self.next
    }

    pub fn is_last(&self) -> bool {
        self.next.is_none()
    }
}

/// Route fragments of all routes passing through one partition.
#[derive(Debug, Clone)]
pub struct RoutePartition<Id, const R: usize> {
    index: usize,
    region: Region<R>,
    fragments: HashMap<Id, Vec<RouteFragment>>,
}

impl<Id: ZoneElement, const R: usize> RoutePartition<Id, R> {
    pub(crate) fn new(
        index: usize,
        region: Region<R>,
        fragments: HashMap<Id, Vec<RouteFragment>>,
    ) -> Self {
        Self {
            index,
            region,
            fragments,
        }
    }

    pub fn offset(&self) -> Offset<R> {
        self.region.offset
    }

    pub fn shape(&self) -> Shape<R> {
        self.region.shape
    }

    /// Number of routes with at least one cell in this partition.
    pub fn nr_routes(&self) -> usize {
        self.fragments.len()
    }

    pub fn nr_route_fragments(&self) -> usize {
        self.fragments.values().map(Vec::len).sum()
    }

    pub fn route_ids(&self) -> BTreeSet<Id> {
        self.fragments.keys().copied().collect()
    }

    /// Fragments of route `id` in this partition, in route order.
    pub fn route_fragments(&self, id: Id) -> &[RouteFragment] {
        self.fragments.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Locations, in other partitions, of fragments continuing routes
    /// from this one.
    pub fn remote_route_fragment_locations(&self) -> Vec<FragmentLocation> {
        let mut locations: Vec<_> = self
            .fragments
            .values()
            .flatten()
            .filter_map(RouteFragment::next)
            .filter(|location| location.partition != self.index)
            .collect();
        locations.sort_unstable();
        locations
    }
}

/// Routes over a partitioned array, keyed by route id.
#[derive(Debug, Clone)]
pub struct SerialRoute<Id, const R: usize> {
    ctx: Context,
    shape: Shape<R>,
    partition_shape: Shape<R>,
    partitions: Vec<RoutePartition<Id, R>>,
    starts: BTreeMap<Id, FragmentLocation>,
}

impl<Id: ZoneElement, const R: usize> SerialRoute<Id, R> {
    pub(crate) fn new(
        ctx: Context,
        shape: Shape<R>,
        partition_shape: Shape<R>,
        partitions: Vec<RoutePartition<Id, R>>,
        starts: BTreeMap<Id, FragmentLocation>,
    ) -> Self {
        Self {
            ctx,
            shape,
            partition_shape,
            partitions,
            starts,
        }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn shape(&self) -> Shape<R> {
        self.shape
    }

    pub fn partition_shape(&self) -> Shape<R> {
        self.partition_shape
    }

    pub fn partitions(&self) -> &[RoutePartition<Id, R>] {
        &self.partitions
    }

    pub fn nr_routes(&self) -> usize {
        self.starts.len()
    }

    pub fn route_ids(&self) -> impl Iterator<Item = Id> + '_ {
        self.starts.keys().copied()
    }

    /// Location of the first fragment of route `id`.
    pub fn start(&self, id: Id) -> Option<FragmentLocation> {
        self.starts.get(&id).copied()
    }

    fn fragment(&self, id: Id, location: FragmentLocation) -> Option<&RouteFragment> {
        self.partitions
            .get(location.partition)?
            .route_fragments(id)
            .get(location.fragment)
    }

    /// Fragments of route `id` in route order, with their partition.
    pub fn walk(&self, id: Id) -> RouteWalk<'_, Id, R> {
        RouteWalk {
            route: self,
            id,
            next: self.start(id),
        }
    }

    /// Global indices of the cells of route `id`, in route order.
    pub fn cells(&self, id: Id) -> Vec<Offset<R>> {
        self.walk(id)
            .flat_map(|(partition, fragment)| {
                let region = self.partitions[partition].region;
                fragment.cells().iter().map(move |&cell| {
                    let mut idx = index_from_linear(&region.shape, cell);
                    for (i, offset) in idx.iter_mut().zip(region.offset) {
                        *i += offset;
                    }
                    idx
                })
            })
            .collect()
    }

    /// Number of cells of route `id`.
    pub fn len(&self, id: Id) -> usize {
        self.walk(id).map(|(_, fragment)| fragment.nr_cells()).sum()
    }
}

/// Iterator over the fragments of one route.
pub struct RouteWalk<'a, Id, const R: usize> {
    route: &'a SerialRoute<Id, R>,
    id: Id,
    next: Option<FragmentLocation>,
}

impl<'a, Id: ZoneElement, const R: usize> Iterator for RouteWalk<'a, Id, R> {
    type Item = (usize, &'a RouteFragment);

    fn next(&mut self) -> Option<Self::Item> {
        let location = self.next.take()?;
        let fragment = self.route.fragment(self.id, location)?;
        self.next = fragment.next();
        Some((location.partition, fragment))
    }
}

/// Builds the fragments of one route while its cells arrive in order.
#[derive(Debug)]
pub(crate) struct RouteBuilder<Id> {
    id: Id,
    /// Fragments per partition, in route order.
    fragments: BTreeMap<usize, Vec<RouteFragment>>,
    current: Option<FragmentLocation>,
    start: Option<FragmentLocation>,
}

impl<Id: ZoneElement> RouteBuilder<Id> {
    pub fn new(id: Id) -> Self {
        Self {
            id,
            fragments: BTreeMap::new(),
            current: None,
            start: None,
        }
    }

    /// Append local cell `cell` of partition `partition` to the route.
    pub fn push(&mut self, partition: usize, cell: usize) {
        match self.current {
            Some(current) if current.partition == partition => {}
            previous => {
                let fragments = self.fragments.entry(partition).or_default();
                let location = FragmentLocation {
                    partition,
                    fragment: fragments.len(),
                };
                fragments.push(RouteFragment::default());
                if let Some(previous) = previous {
                    if let Some(fragment) = self
                        .fragments
                        .get_mut(&previous.partition)
                        .and_then(|fragments| fragments.get_mut(previous.fragment))
                    {
                        fragment.next = Some(location);
                    }
                }
                if self.start.is_none() {
                    self.start = Some(location);
                }
                self.current = Some(location);
            }
        }

        if let Some(current) = self.current {
            if let Some(fragment) = self
                .fragments
                .get_mut(&current.partition)
                .and_then(|fragments| fragments.get_mut(current.fragment))
            {
                fragment.cells.push(cell);
            }
        }
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn start(&self) -> Option<FragmentLocation> {
        self.start
    }

    pub fn into_fragments(self) -> BTreeMap<usize, Vec<RouteFragment>> {
        self.fragments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route() -> SerialRoute<u8, 2> {
        // Cells of a 2×4 array in two 2×2 partitions, visited as
        // p0:[3, 0] -> p1:[1] -> p0:[2]
        let mut builder = RouteBuilder::new(1_u8);
        for (partition, cell) in [(0, 3), (0, 0), (1, 1), (0, 2)] {
            builder.push(partition, cell);
        }
        let start = builder.start().unwrap();
        let mut fragments = builder.into_fragments();

        let partitions = (0..2)
            .map(|p| {
                let region = Region::new([0, 2 * p], [2, 2]);
                let route_fragments = fragments
                    .remove(&p)
                    .map(|f| HashMap::from([(1_u8, f)]))
                    .unwrap_or_default();
                RoutePartition::new(p, region, route_fragments)
            })
            .collect();

        SerialRoute::new(
            Context::default(),
            [2, 4],
            [2, 2],
            partitions,
            BTreeMap::from([(1, start)]),
        )
    }

    #[test]
    fn test_fragments_link_across_partitions() {
        let route = route();
        let p0 = &route.partitions()[0];
        assert_eq!(p0.nr_routes(), 1);
        assert_eq!(p0.nr_route_fragments(), 2);
        assert_eq!(p0.route_fragments(1)[0].cells(), &[3, 0]);
        assert_eq!(
            p0.remote_route_fragment_locations(),
            vec![FragmentLocation {
                partition: 1,
                fragment: 0
            }]
        );
        assert!(p0.route_fragments(1)[1].is_last());
        assert!(p0.route_fragments(7).is_empty());
    }

    #[test]
    fn test_walk_yields_global_cells_in_order() {
        let route = route();
        assert_eq!(route.len(1), 4);
        assert_eq!(
            route.cells(1),
            vec![[1, 1], [0, 0], [0, 3], [1, 0]]
        );
        assert!(route.cells(2).is_empty());
    }
}
