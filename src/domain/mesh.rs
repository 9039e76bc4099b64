/// Circular-arc edges and the blending used to map curved elements
pub mod curved;
/// Base elements and the sons produced by h-refinement
pub mod elem;

use super::space::{Point, M2D, V2D};
use super::transform::Transform;
use crate::error::MeshError;
use curved::{CurvMap, EdgeArc};
use elem::{Elem, ElemMode};

use json::JsonValue;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::fs::read_to_string;
#[cfg(feature = "json_export")]
use std::{fs::File, io::BufWriter};

/// Boundary marker assigned to boundary edges that aren't given one explicitly
pub const DEFAULT_BOUNDARY_MARKER: u32 = 1;

/// Step size of the central differences used for the Jacobian of curved elements
const CURVED_JACOBIAN_STEP: f64 = 1e-6;

/// Geometric structure and h-refinement state of a 2D domain
///
/// Elements are stored in creation order: the base elements first, followed by the sons of each
/// refinement. A son always appears after its parent.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub nodes: Vec<Point>,
    pub elems: Vec<Elem>,
    curves: Vec<Option<CurvMap>>,
    num_base_elems: usize,
    num_base_nodes: usize,
    midpoints: HashMap<(usize, usize), usize>,
}

impl Mesh {
    /// Build a mesh from node locations and the (counter-clockwise) node lists of each base element
    ///
    /// Edges belonging to a single element are marked as boundary edges with [DEFAULT_BOUNDARY_MARKER].
    pub fn new(nodes: Vec<Point>, elements: Vec<Vec<usize>>) -> Result<Self, MeshError> {
        let markers = vec![0; elements.len()];
        Self::with_markers(nodes, elements, markers)
    }

    /// Same as [Mesh::new] with an explicit marker on each element
    pub fn with_markers(
        nodes: Vec<Point>,
        elements: Vec<Vec<usize>>,
        markers: Vec<u32>,
    ) -> Result<Self, MeshError> {
        if elements.is_empty() {
            return Err(MeshError::Format("a mesh needs at least one element".to_string()));
        }
        if has_duplicates(&nodes) {
            return Err(MeshError::Format(
                "all nodes must be at unique locations".to_string(),
            ));
        }

        // count how many elements share each edge
        let mut edge_counts: HashMap<(usize, usize), usize> = HashMap::new();
        for (elem_id, node_ids) in elements.iter().enumerate() {
            if ElemMode::from_num_vertices(node_ids.len()).is_none() {
                return Err(MeshError::Format(format!(
                    "Elem {} has {} nodes; elements must have 3 or 4",
                    elem_id,
                    node_ids.len()
                )));
            }
            if let Some(bad_id) = node_ids.iter().find(|id| **id >= nodes.len()) {
                return Err(MeshError::Format(format!(
                    "Elem {} references node {}, but there are only {} nodes",
                    elem_id,
                    bad_id,
                    nodes.len()
                )));
            }
            if has_duplicates(node_ids) {
                return Err(MeshError::Format(format!(
                    "Elem {} must have unique node_ids",
                    elem_id
                )));
            }
            if signed_area(&nodes, node_ids) <= 0.0 {
                return Err(MeshError::BadOrientation(elem_id));
            }

            for (a, b) in edge_node_pairs(node_ids) {
                *edge_counts.entry(edge_key(a, b)).or_insert(0) += 1;
            }
        }

        if let Some(((a, b), _)) = edge_counts.iter().find(|(_, count)| **count > 2) {
            return Err(MeshError::NonManifold(*a, *b));
        }

        let elems: Vec<Elem> = elements
            .iter()
            .zip(markers.iter())
            .enumerate()
            .map(|(elem_id, (node_ids, marker))| {
                let boundary: SmallVec<[bool; 4]> = edge_node_pairs(node_ids)
                    .map(|(a, b)| edge_counts[&edge_key(a, b)] == 1)
                    .collect();
                let edge_markers = boundary
                    .iter()
                    .map(|on_bnd| if *on_bnd { DEFAULT_BOUNDARY_MARKER } else { 0 })
                    .collect();

                Elem::new_base(
                    elem_id,
                    SmallVec::from_slice(node_ids),
                    boundary,
                    edge_markers,
                    *marker,
                )
            })
            .collect();

        Ok(Self {
            num_base_elems: elems.len(),
            num_base_nodes: nodes.len(),
            curves: vec![None; elems.len()],
            nodes,
            elems,
            midpoints: HashMap::new(),
        })
    }

    /// A rectangle `[x0, x1] x [y0, y1]` divided into `nx` by `ny` quads
    pub fn rect_quads(x: [f64; 2], y: [f64; 2], [nx, ny]: [usize; 2]) -> Result<Self, MeshError> {
        let (nodes, cells) = rect_grid(x, y, [nx, ny])?;
        let elements = cells.iter().map(|c| c.to_vec()).collect();
        Self::new(nodes, elements)
    }

    /// A rectangle `[x0, x1] x [y0, y1]` divided into `nx` by `ny` cells, each split into two triangles
    pub fn rect_triangles(
        x: [f64; 2],
        y: [f64; 2],
        [nx, ny]: [usize; 2],
    ) -> Result<Self, MeshError> {
        let (nodes, cells) = rect_grid(x, y, [nx, ny])?;
        let elements = cells
            .iter()
            .flat_map(|[n0, n1, n2, n3]| [vec![*n0, *n1, *n2], vec![*n2, *n3, *n0]])
            .collect();
        Self::new(nodes, elements)
    }

    /// Construct a Mesh from a JSON file with the following format
    ///
    /// "Boundaries" and "Curves" are optional, as is each element's "marker".
    /// ```text
    ///     3               2
    /// 1.0 *---------------*
    ///     |             / |
    ///     |   1       /   |
    ///     |         /     |
    ///     |       /       |
    ///     |     /     0   |
    ///     |   /           |
    /// 0.0 *---------------*
    ///  y  0               1
    ///  x 0.0             1.0
    /// ```
    ///
    /// mesh.json
    /// ```JSON
    /// {
    ///     "Nodes": [
    ///         [0.0, 0.0],
    ///         [1.0, 0.0],
    ///         [1.0, 1.0],
    ///         [0.0, 1.0]
    ///     ],
    ///     "Elements": [
    ///         { "node_ids": [0, 1, 2], "marker": 0 },
    ///         { "node_ids": [2, 3, 0], "marker": 1 }
    ///     ],
    ///     "Boundaries": [
    ///         { "node_ids": [0, 1], "marker": 2 }
    ///     ],
    ///     "Curves": [
    ///         { "node_ids": [1, 2], "angle": 45.0 }
    ///     ]
    /// }
    /// ```
    pub fn from_file(path: impl AsRef<str>) -> Result<Self, MeshError> {
        let mesh_file_contents = read_to_string(path.as_ref())?;
        Self::from_json_str(&mesh_file_contents)
    }

    /// Construct a Mesh from the JSON format described in [Mesh::from_file]
    pub fn from_json_str(contents: &str) -> Result<Self, MeshError> {
        let mesh_json = json::parse(contents)?;

        let nodes = parse_node_information(&mesh_json)?;
        let (elements, markers) = parse_element_information(&mesh_json)?;
        let mut mesh = Self::with_markers(nodes, elements, markers)?;

        for (edge, marker) in parse_edge_list(&mesh_json, "Boundaries", "marker")? {
            let marker = as_marker(marker)?;
            mesh.set_boundary_marker(edge, marker)?;
        }
        for (edge, angle) in parse_edge_list(&mesh_json, "Curves", "angle")? {
            let angle = angle
                .as_f64()
                .ok_or_else(|| MeshError::Format("arc angles must be numerical values".to_string()))?;
            mesh.curve_edge(edge, angle)?;
        }

        Ok(mesh)
    }

    /// Print the mesh to a JSON file specified by path.
    #[cfg(feature = "json_export")]
    pub fn export_to_json(&self, path: impl AsRef<str>) -> std::io::Result<()> {
        let f = File::create(path.as_ref())?;
        let mut w = BufWriter::new(&f);

        let mut curves = JsonValue::new_array();
        for (elem_id, curv) in self.curves.iter().enumerate() {
            if let Some(curv) = curv {
                for (edge, arc) in curv.arcs.iter().enumerate() {
                    if let Some(arc) = arc {
                        let elem = &self.elems[elem_id];
                        let a = elem.nodes[edge];
                        let b = elem.nodes[elem.mode.next_vertex(edge)];
                        // interior arcs are stored on both neighbors; only export them once
                        if elem.boundary[edge] || a < b {
                            curves
                                .push(json::object! {
                                    "node_ids": JsonValue::from(vec![a, b]),
                                    "angle": arc.angle,
                                })
                                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
                        }
                    }
                }
            }
        }

        let mesh_object = json::object! {
            "Nodes": JsonValue::from(self.nodes.iter().map(|p| JsonValue::from(vec![p.x, p.y])).collect::<Vec<_>>()),
            "Elems": JsonValue::from(self.elems.iter().map(|elem| elem.to_json()).collect::<Vec<_>>()),
            "Curves": curves,
        };

        mesh_object.write_pretty(&mut w, 4)?;

        Ok(())
    }

    // ----------------------------------------------------------------------------------------------------
    // General Data Retrieval
    // ----------------------------------------------------------------------------------------------------

    pub fn num_base_elems(&self) -> usize {
        self.num_base_elems
    }

    pub fn base_elems(&self) -> impl Iterator<Item = &Elem> + '_ {
        self.elems.iter().take(self.num_base_elems)
    }

    /// Iterate over the elements that haven't been h-refined
    pub fn active_elems(&self) -> impl Iterator<Item = &Elem> + '_ {
        self.elems.iter().filter(|elem| elem.is_active())
    }

    pub fn elem(&self, elem_id: usize) -> Result<&Elem, MeshError> {
        self.elems.get(elem_id).ok_or(MeshError::NoSuchElem(elem_id))
    }

    /// Physical locations of an element's vertices
    pub fn elem_points(&self, elem_id: usize) -> SmallVec<[Point; 4]> {
        self.elems[elem_id]
            .nodes
            .iter()
            .map(|node_id| self.nodes[*node_id])
            .collect()
    }

    /// Whether `other` was built from the same base elements and nodes (it may be refined differently)
    pub fn shares_base_with(&self, other: &Self) -> bool {
        self.num_base_elems == other.num_base_elems
            && self.num_base_nodes == other.num_base_nodes
            && self.nodes[..self.num_base_nodes] == other.nodes[..other.num_base_nodes]
            && self
                .base_elems()
                .zip(other.base_elems())
                .all(|(a, b)| a.nodes == b.nodes)
    }

    /// The reference map of an element
    pub fn refmap(&self, elem_id: usize) -> RefMap<'_> {
        let elem = &self.elems[elem_id];
        self.sub_refmap(elem.base, elem.trf)
    }

    /// The reference map of an arbitrary sub-element of a base element
    pub fn sub_refmap(&self, base_id: usize, trf: Transform) -> RefMap<'_> {
        let base = &self.elems[base_id];
        RefMap {
            mode: base.mode,
            corners: self.elem_points(base_id),
            curv: self.curves[base_id].as_ref().filter(|c| c.is_curved()),
            trf,
        }
    }

    // ----------------------------------------------------------------------------------------------------
    // Boundary and Curvature Information
    // ----------------------------------------------------------------------------------------------------

    /// Set the marker of the boundary edge between two nodes (on every element along it)
    pub fn set_boundary_marker(&mut self, [a, b]: [usize; 2], marker: u32) -> Result<(), MeshError> {
        let edges = self.base_edges_between(a, b);
        match edges.as_slice() {
            [] => Err(MeshError::NoSuchEdge(a, b)),
            [(elem_id, edge, _)] if self.elems[*elem_id].boundary[*edge] => {
                self.elems[*elem_id].edge_markers[*edge] = marker;
                self.propagate_edge_markers();
                Ok(())
            }
            _ => Err(MeshError::NotOnBoundary(a, b)),
        }
    }

    /// Set the marker of a base element (sons inherit it)
    pub fn set_elem_marker(&mut self, elem_id: usize, marker: u32) -> Result<(), MeshError> {
        if elem_id >= self.num_base_elems {
            return Err(MeshError::NoSuchElem(elem_id));
        }
        for elem in self.elems.iter_mut().filter(|elem| elem.base == elem_id) {
            elem.marker = marker;
        }
        Ok(())
    }

    /// Replace the straight edge `a -> b` with a circular arc of `angle` degrees
    ///
    /// Positive angles bulge to the right of the direction `a -> b`. Interior edges are curved
    /// on both neighboring elements.
    pub fn curve_edge(&mut self, [a, b]: [usize; 2], angle: f64) -> Result<(), MeshError> {
        if !EdgeArc::is_valid_angle(angle) {
            return Err(MeshError::InvalidArc(angle));
        }

        let edges = self.base_edges_between(a, b);
        if edges.is_empty() {
            return Err(MeshError::NoSuchEdge(a, b));
        }

        for (elem_id, edge, forward) in edges {
            let num_edges = self.elems[elem_id].num_vertices();
            let curv = self.curves[elem_id].get_or_insert_with(|| CurvMap::new(num_edges));
            curv.arcs[edge] = Some(EdgeArc {
                angle: if forward { angle } else { -angle },
            });
        }

        Ok(())
    }

    pub fn is_curved(&self, elem_id: usize) -> bool {
        let base = self.elems[elem_id].base;
        self.curves[base].as_ref().map_or(false, |c| c.is_curved())
    }

    // (elem_id, edge_idx, same direction as a -> b) for every base element edge connecting the two nodes
    fn base_edges_between(&self, a: usize, b: usize) -> Vec<(usize, usize, bool)> {
        self.base_elems()
            .flat_map(|elem| {
                edge_node_pairs(&elem.nodes)
                    .enumerate()
                    .filter_map(move |(edge, (n0, n1))| {
                        if n0 == a && n1 == b {
                            Some((elem.id, edge, true))
                        } else if n0 == b && n1 == a {
                            Some((elem.id, edge, false))
                        } else {
                            None
                        }
                    })
            })
            .collect()
    }

    // re-derive the edge markers of all sons from their parents (parents always precede their sons)
    fn propagate_edge_markers(&mut self) {
        for elem_id in self.num_base_elems..self.elems.len() {
            if let Some(parent_id) = self.elems[elem_id].parent() {
                let parent_mode = self.elems[parent_id].mode;
                let parent_markers = self.elems[parent_id].edge_markers.clone();
                let son_trf = son_transform_of(&self.elems[parent_id], elem_id);

                for edge in 0..parent_mode.num_vertices() {
                    if let Some(parent_edge) = son_trf.edge_on_ref_edge(parent_mode, edge) {
                        self.elems[elem_id].edge_markers[edge] = parent_markers[parent_edge];
                    }
                }
            }
        }
    }

    // ----------------------------------------------------------------------------------------------------
    // h-Refinement
    // ----------------------------------------------------------------------------------------------------

    /// Split an active element into 4 sons
    ///
    /// Triangle sons are `(v0, m0, m2)`, `(m0, v1, m1)`, `(m2, m1, v2)` and `(m1, m2, m0)`; quad sons are the
    /// four quadrants counter-clockwise from `v0`. Nodes on shared edges are reused between neighbors.
    pub fn refine_element(&mut self, elem_id: usize) -> Result<[usize; 4], MeshError> {
        let elem = self.elem(elem_id)?;
        if !elem.is_active() {
            return Err(MeshError::AlreadyRefined(elem_id));
        }

        let mode = elem.mode;
        let v = elem.nodes.clone();
        let mids: SmallVec<[usize; 4]> = (0..mode.num_vertices())
            .map(|edge| self.midpoint_node(elem_id, edge))
            .collect();

        let son_nodes: [SmallVec<[usize; 4]>; 4] = match mode {
            ElemMode::Triangle => [
                SmallVec::from_slice(&[v[0], mids[0], mids[2]]),
                SmallVec::from_slice(&[mids[0], v[1], mids[1]]),
                SmallVec::from_slice(&[mids[2], mids[1], v[2]]),
                SmallVec::from_slice(&[mids[1], mids[2], mids[0]]),
            ],
            ElemMode::Quad => {
                let center = self.refmap(elem_id).phys(V2D::from([0.0, 0.0]));
                self.nodes.push(center);
                let c = self.nodes.len() - 1;
                [
                    SmallVec::from_slice(&[v[0], mids[0], c, mids[3]]),
                    SmallVec::from_slice(&[mids[0], v[1], mids[1], c]),
                    SmallVec::from_slice(&[c, mids[1], v[2], mids[2]]),
                    SmallVec::from_slice(&[mids[3], c, mids[2], v[3]]),
                ]
            }
        };

        let first_son_id = self.elems.len();
        let son_ids = [first_son_id, first_son_id + 1, first_son_id + 2, first_son_id + 3];

        for (son, nodes) in son_nodes.into_iter().enumerate() {
            let son_elem = Elem::new_son(son_ids[son], &self.elems[elem_id], son, nodes);
            self.elems.push(son_elem);
        }
        self.elems[elem_id].set_sons(son_ids);

        Ok(son_ids)
    }

    /// Refine a list of elements (each must be active)
    pub fn refine_elems(&mut self, elem_ids: Vec<usize>) -> Result<(), MeshError> {
        for elem_id in elem_ids {
            self.refine_element(elem_id)?;
        }
        Ok(())
    }

    /// Refine every active element once
    pub fn refine_all(&mut self) -> Result<(), MeshError> {
        let active: Vec<usize> = self.active_elems().map(|elem| elem.id).collect();
        self.refine_elems(active)
    }

    fn midpoint_node(&mut self, elem_id: usize, edge: usize) -> usize {
        let elem = &self.elems[elem_id];
        let a = elem.nodes[edge];
        let b = elem.nodes[elem.mode.next_vertex(edge)];

        if let Some(node_id) = self.midpoints.get(&edge_key(a, b)) {
            return *node_id;
        }

        let mode = elem.mode;
        let ref_mid = (mode.ref_vertex(edge) + mode.ref_vertex(mode.next_vertex(edge))) / 2.0;
        let location = self.refmap(elem_id).phys(ref_mid);

        self.nodes.push(location);
        let node_id = self.nodes.len() - 1;
        self.midpoints.insert(edge_key(a, b), node_id);
        node_id
    }
}

/// Maps points on an element's reference domain into physical space
///
/// Geometry is always evaluated on the base element; `trf` places the (sub-)element inside it.
#[derive(Clone, Debug)]
pub struct RefMap<'m> {
    mode: ElemMode,
    corners: SmallVec<[Point; 4]>,
    curv: Option<&'m CurvMap>,
    trf: Transform,
}

impl<'m> RefMap<'m> {
    pub fn is_curved(&self) -> bool {
        self.curv.is_some()
    }

    pub fn mode(&self) -> ElemMode {
        self.mode
    }

    /// Physical location of a reference point
    pub fn phys(&self, p: V2D) -> Point {
        self.base_phys(self.trf.apply(p))
    }

    /// Jacobian `d(x, y) / d(u, v)` at a reference point
    pub fn jacobian(&self, p: V2D) -> M2D {
        let q = self.trf.apply(p);
        let base_jac = match self.curv {
            None => self.straight_jacobian(q),
            Some(_) => {
                let h = CURVED_JACOBIAN_STEP;
                let du = (self.base_phys(q + V2D::from([h, 0.0]))
                    - self.base_phys(q - V2D::from([h, 0.0])))
                    / (2.0 * h);
                let dv = (self.base_phys(q + V2D::from([0.0, h]))
                    - self.base_phys(q - V2D::from([0.0, h])))
                    / (2.0 * h);
                M2D::from([du[0], dv[0]], [du[1], dv[1]])
            }
        };

        // chain rule through the diagonal sub-element transform
        M2D::from(
            [base_jac.u[0] * self.trf.m[0], base_jac.u[1] * self.trf.m[1]],
            [base_jac.v[0] * self.trf.m[0], base_jac.v[1] * self.trf.m[1]],
        )
    }

    fn base_phys(&self, q: V2D) -> Point {
        let straight = self.straight_phys(q);
        match self.curv {
            None => straight,
            Some(curv) => straight + curv.offset(self.mode, &self.corners, q),
        }
    }

    fn straight_phys(&self, q: V2D) -> Point {
        let weights = self.shape_weights(q);
        let (x, y) = self
            .corners
            .iter()
            .zip(weights.iter())
            .fold((0.0, 0.0), |(x, y), (p, w)| (x + p.x * w, y + p.y * w));
        Point::new(x, y)
    }

    fn shape_weights(&self, q: V2D) -> SmallVec<[f64; 4]> {
        let [x, y] = [q[0], q[1]];
        match self.mode {
            ElemMode::Triangle => {
                SmallVec::from_slice(&[-(x + y) / 2.0, (1.0 + x) / 2.0, (1.0 + y) / 2.0])
            }
            ElemMode::Quad => SmallVec::from_slice(&[
                (1.0 - x) * (1.0 - y) / 4.0,
                (1.0 + x) * (1.0 - y) / 4.0,
                (1.0 + x) * (1.0 + y) / 4.0,
                (1.0 - x) * (1.0 + y) / 4.0,
            ]),
        }
    }

    fn straight_jacobian(&self, q: V2D) -> M2D {
        let c = &self.corners;
        match self.mode {
            ElemMode::Triangle => M2D::from(
                [(c[1].x - c[0].x) / 2.0, (c[2].x - c[0].x) / 2.0],
                [(c[1].y - c[0].y) / 2.0, (c[2].y - c[0].y) / 2.0],
            ),
            ElemMode::Quad => {
                let [x, y] = [q[0], q[1]];
                let d_dx = [-(1.0 - y) / 4.0, (1.0 - y) / 4.0, (1.0 + y) / 4.0, -(1.0 + y) / 4.0];
                let d_dy = [-(1.0 - x) / 4.0, -(1.0 + x) / 4.0, (1.0 + x) / 4.0, (1.0 - x) / 4.0];

                let mut jac = [[0.0; 2]; 2];
                for i in 0..4 {
                    jac[0][0] += c[i].x * d_dx[i];
                    jac[0][1] += c[i].x * d_dy[i];
                    jac[1][0] += c[i].y * d_dx[i];
                    jac[1][1] += c[i].y * d_dy[i];
                }
                M2D::from(jac[0], jac[1])
            }
        }
    }
}

// which son of `parent` the element `son_id` is
fn son_transform_of(parent: &Elem, son_id: usize) -> Transform {
    let sons = parent.sons().unwrap_or([usize::MAX; 4]);
    let son = sons
        .iter()
        .position(|id| *id == son_id)
        .unwrap_or_else(|| unreachable!("Elem {} is not a son of Elem {}", son_id, parent.id));
    Transform::son(parent.mode, son)
}

fn edge_key(a: usize, b: usize) -> (usize, usize) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

fn edge_node_pairs(node_ids: &[usize]) -> impl Iterator<Item = (usize, usize)> + '_ {
    (0..node_ids.len()).map(move |i| (node_ids[i], node_ids[(i + 1) % node_ids.len()]))
}

fn signed_area(nodes: &[Point], node_ids: &[usize]) -> f64 {
    edge_node_pairs(node_ids)
        .map(|(a, b)| nodes[a].x * nodes[b].y - nodes[b].x * nodes[a].y)
        .sum::<f64>()
        / 2.0
}

fn rect_grid(
    [x0, x1]: [f64; 2],
    [y0, y1]: [f64; 2],
    [nx, ny]: [usize; 2],
) -> Result<(Vec<Point>, Vec<[usize; 4]>), MeshError> {
    if nx == 0 || ny == 0 || !(x1 > x0) || !(y1 > y0) {
        return Err(MeshError::Format(format!(
            "cannot build a {}x{} grid over [{}, {}] x [{}, {}]",
            nx, ny, x0, x1, y0, y1
        )));
    }

    let nodes = (0..=ny)
        .flat_map(|j| {
            (0..=nx).map(move |i| {
                Point::new(
                    x0 + (x1 - x0) * i as f64 / nx as f64,
                    y0 + (y1 - y0) * j as f64 / ny as f64,
                )
            })
        })
        .collect();

    let cells = (0..ny)
        .flat_map(|j| {
            (0..nx).map(move |i| {
                let n0 = j * (nx + 1) + i;
                [n0, n0 + 1, n0 + nx + 2, n0 + nx + 1]
            })
        })
        .collect();

    Ok((nodes, cells))
}

fn parse_node_information(mesh_json: &JsonValue) -> Result<Vec<Point>, MeshError> {
    if !mesh_json["Nodes"].is_array() {
        return Err(MeshError::Format("Nodes must be an Array".to_string()));
    }

    mesh_json["Nodes"]
        .members()
        .map(|json_node_point| {
            if !json_node_point.is_array() || json_node_point.members().count() != 2 {
                return Err(MeshError::Format(
                    "nodes must be arrays of length 2".to_string(),
                ));
            }
            match (json_node_point[0].as_f64(), json_node_point[1].as_f64()) {
                (Some(x), Some(y)) => Ok(Point::new(x, y)),
                _ => Err(MeshError::Format(
                    "nodes must be composed of numerical values".to_string(),
                )),
            }
        })
        .collect()
}

fn parse_element_information(mesh_json: &JsonValue) -> Result<(Vec<Vec<usize>>, Vec<u32>), MeshError> {
    if !mesh_json["Elements"].is_array() {
        return Err(MeshError::Format("Elements must be an Array".to_string()));
    }

    let mut elements = Vec::new();
    let mut markers = Vec::new();

    for json_element in mesh_json["Elements"].members() {
        elements.push(parse_node_ids(&json_element["node_ids"])?);

        let marker = &json_element["marker"];
        markers.push(if marker.is_null() { 0 } else { as_marker(marker)? });
    }

    Ok((elements, markers))
}

// (node pair, value) entries of an optional list of edge descriptions
fn parse_edge_list<'j>(
    mesh_json: &'j JsonValue,
    list: &str,
    value_key: &str,
) -> Result<Vec<([usize; 2], &'j JsonValue)>, MeshError> {
    let entries = &mesh_json[list];
    if entries.is_null() {
        return Ok(Vec::new());
    }
    if !entries.is_array() {
        return Err(MeshError::Format(format!("{} must be an Array", list)));
    }

    entries
        .members()
        .map(|entry| {
            let node_ids = parse_node_ids(&entry["node_ids"])?;
            match node_ids.as_slice() {
                [a, b] if !entry[value_key].is_null() => Ok(([*a, *b], &entry[value_key])),
                _ => Err(MeshError::Format(format!(
                    "{} entries need 2 node_ids and a {}",
                    list, value_key
                ))),
            }
        })
        .collect()
}

fn parse_node_ids(json_ids: &JsonValue) -> Result<Vec<usize>, MeshError> {
    if !json_ids.is_array() {
        return Err(MeshError::Format("node_ids must be an Array".to_string()));
    }
    json_ids
        .members()
        .map(|id| {
            id.as_usize().ok_or_else(|| {
                MeshError::Format("node_ids must be positive integers".to_string())
            })
        })
        .collect()
}

fn as_marker(json_marker: &JsonValue) -> Result<u32, MeshError> {
    json_marker
        .as_u32()
        .ok_or_else(|| MeshError::Format("markers must be positive integers".to_string()))
}

fn has_duplicates<T>(values: &[T]) -> bool
where
    T: PartialEq,
{
    for (i, val) in values.iter().enumerate() {
        for val_cmp in values.iter().skip(i + 1) {
            if val == val_cmp {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_TRIANGLES: &str = r#"{
        "Nodes": [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
        "Elements": [
            { "node_ids": [0, 1, 2], "marker": 4 },
            { "node_ids": [2, 3, 0] }
        ],
        "Boundaries": [ { "node_ids": [1, 2], "marker": 7 } ]
    }"#;

    #[test]
    fn mesh_from_json() {
        let mesh = Mesh::from_json_str(TWO_TRIANGLES).unwrap();
        assert_eq!(mesh.elems.len(), 2);
        assert_eq!(mesh.elems[0].marker, 4);
        assert_eq!(mesh.elems[1].marker, 0);

        // the diagonal is shared; everything else is on the boundary
        assert_eq!(mesh.elems[0].boundary.to_vec(), vec![true, true, false]);
        assert_eq!(mesh.elems[1].boundary.to_vec(), vec![true, true, false]);
        assert_eq!(mesh.elems[0].edge_markers.to_vec(), vec![1, 7, 0]);
    }

    #[test]
    fn mesh_from_file() {
        let mesh = Mesh::from_file("./test_input/quarter_annulus.json").unwrap();
        assert_eq!(mesh.num_base_elems(), 2);
        assert!(mesh.is_curved(0));
        assert!(mesh.is_curved(1));

        // the outer arc has radius 2
        let outer = mesh.refmap(0).phys(V2D::from([1.0, 0.3]));
        assert!((outer.as_v2d().norm() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn bad_meshes() {
        let nodes = vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(0.0, 1.0)];
        assert!(matches!(
            Mesh::new(nodes.clone(), vec![vec![0, 2, 1]]),
            Err(MeshError::BadOrientation(0))
        ));
        assert!(matches!(
            Mesh::new(nodes.clone(), vec![vec![0, 1, 3]]),
            Err(MeshError::Format(_))
        ));
        assert!(matches!(
            Mesh::new(nodes, vec![vec![0, 1]]),
            Err(MeshError::Format(_))
        ));
        assert!(matches!(
            Mesh::from_json_str("{ \"Nodes\": 3 }"),
            Err(MeshError::Format(_))
        ));
    }

    #[test]
    fn refinement_shares_midpoints() {
        let mut mesh = Mesh::rect_quads([0.0, 2.0], [0.0, 1.0], [2, 1]).unwrap();
        let num_nodes = mesh.nodes.len();

        mesh.refine_element(0).unwrap();
        // 4 midpoints + center
        assert_eq!(mesh.nodes.len(), num_nodes + 5);

        mesh.refine_element(1).unwrap();
        // the shared edge's midpoint is reused
        assert_eq!(mesh.nodes.len(), num_nodes + 9);

        assert!(matches!(mesh.refine_element(0), Err(MeshError::AlreadyRefined(0))));
        assert!(matches!(mesh.refine_element(100), Err(MeshError::NoSuchElem(100))));
        assert_eq!(mesh.active_elems().count(), 8);
    }

    #[test]
    fn sons_inherit_boundary_markers() {
        let mut mesh = Mesh::rect_triangles([0.0, 1.0], [0.0, 1.0], [1, 1]).unwrap();
        let sons = mesh.refine_element(0).unwrap();
        mesh.set_boundary_marker([0, 1], 3).unwrap();

        let son_0 = &mesh.elems[sons[0]];
        assert_eq!(son_0.edge_markers.to_vec(), vec![3, 0, 0]);
        assert_eq!(son_0.boundary.to_vec(), vec![true, false, false]);

        let center = &mesh.elems[sons[3]];
        assert!(center.boundary.iter().all(|b| !b));

        assert!(matches!(
            mesh.set_boundary_marker([0, 2], 5),
            Err(MeshError::NotOnBoundary(0, 2))
        ));
    }

    #[test]
    fn son_geometry() {
        let mut mesh = Mesh::rect_quads([0.0, 2.0], [0.0, 2.0], [1, 1]).unwrap();
        let sons = mesh.refine_element(0).unwrap();
        let sub_sons = mesh.refine_element(sons[2]).unwrap();

        let rm = mesh.refmap(sub_sons[0]);
        let lower_left = rm.phys(V2D::from([-1.0, -1.0]));
        let upper_right = rm.phys(V2D::from([1.0, 1.0]));
        assert_eq!(lower_left, Point::new(1.0, 1.0));
        assert_eq!(upper_right, Point::new(1.5, 1.5));

        // each refinement halves the Jacobian
        let jac = rm.jacobian(V2D::from([0.3, -0.2]));
        assert!((jac.det() - 0.0625).abs() < 1e-14);

        // son nodes match the refmap
        for (v, node_id) in mesh.elems[sub_sons[0]].nodes.iter().enumerate() {
            assert_eq!(mesh.nodes[*node_id], rm.phys(ElemMode::Quad.ref_vertex(v)));
        }
    }

    #[test]
    fn curved_jacobian() {
        let mut mesh = Mesh::rect_quads([0.0, 1.0], [0.0, 1.0], [1, 1]).unwrap();
        mesh.curve_edge([1, 2], 30.0).unwrap();
        assert!(matches!(mesh.curve_edge([1, 2], 180.0), Err(MeshError::InvalidArc(_))));
        assert!(matches!(mesh.curve_edge([0, 2], 10.0), Err(MeshError::NoSuchEdge(0, 2))));

        let rm = mesh.refmap(0);
        let p = V2D::from([0.25, 0.5]);
        let jac = rm.jacobian(p);

        // compare against a coarse finite difference of the map itself
        let h = 1e-4;
        let fd = (rm.phys(p + V2D::from([h, 0.0])) - rm.phys(p - V2D::from([h, 0.0]))) / (2.0 * h);
        assert!((jac.u[0] - fd[0]).abs() < 1e-6);
        assert!((jac.v[0] - fd[1]).abs() < 1e-6);
    }

    #[test]
    fn base_sharing() {
        let a = Mesh::rect_quads([0.0, 1.0], [0.0, 1.0], [2, 2]).unwrap();
        let mut b = a.clone();
        b.refine_all().unwrap();
        let c = Mesh::rect_quads([0.0, 1.0], [0.0, 2.0], [2, 2]).unwrap();

        assert!(a.shares_base_with(&b));
        assert!(!a.shares_base_with(&c));
    }

    #[cfg(feature = "json_export")]
    #[test]
    fn refined_mesh_to_file() {
        let mut mesh = Mesh::from_json_str(TWO_TRIANGLES).unwrap();
        mesh.curve_edge([0, 1], -20.0).unwrap();
        mesh.refine_all().unwrap();
        mesh.export_to_json("./test_output/two_triangles_refined.json")
            .unwrap();
    }
}
