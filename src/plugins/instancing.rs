//! GPU instancing for vegetation batches.
//!
//! Every batch entity carries a `Handle<Mesh>` plus an [`InstancedBatch`]. The render
//! world keeps one vertex buffer per batch for as long as the batch's instance data is
//! unchanged, and draws the first `visible_count` instances. Shrinking a batch is a
//! single integer write on the main-world side.

use std::collections::HashMap;
use std::sync::Arc;

use bevy::core_pipeline::core_3d::Transparent3d;
use bevy::ecs::query::QueryItem;
use bevy::ecs::system::{lifetimeless::SRes, SystemParamItem};
use bevy::pbr::{MeshPipeline, MeshPipelineKey, RenderMeshInstances, SetMeshBindGroup, SetMeshViewBindGroup};
use bevy::prelude::*;
use bevy::render::{
    extract_component::{ExtractComponent, ExtractComponentPlugin},
    extract_resource::ExtractResourcePlugin,
    mesh::{GpuBufferInfo, GpuMesh, MeshVertexBufferLayoutRef},
    render_asset::RenderAssets,
    render_phase::{
        AddRenderCommand, DrawFunctions, PhaseItem, PhaseItemExtraIndex, RenderCommand, RenderCommandResult,
        SetItemPipeline, TrackedRenderPass, ViewSortedRenderPhases,
    },
    render_resource::{binding_types::uniform_buffer, *},
    renderer::{RenderDevice, RenderQueue},
    view::ExtractedView,
    Render, RenderApp, RenderSet,
};
use bytemuck::{Pod, Zeroable};

use crate::plugins::shading::{ShadingSettings, ShadingUniform, SHADER_PATH};

/// Per-instance vertex data (locations 3..=8 in vegetation.wgsl).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct InstanceRaw {
    /// Column-major model matrix.
    pub model: [[f32; 4]; 4],
    /// Linear rgb + color shift in `a`.
    pub color: [f32; 4],
    /// x: wind weight, y: world height scale, zw unused.
    pub params: [f32; 4],
}

impl InstanceRaw {
    pub fn new(transform: &Transform, color: LinearRgba, color_shift: f32, wind_weight: f32) -> Self {
        Self {
            model: transform.compute_matrix().to_cols_array_2d(),
            color: [color.red, color.green, color.blue, color_shift],
            params: [wind_weight, transform.scale.y, 0.0, 0.0],
        }
    }

    pub fn translation(&self) -> Vec3 {
        Vec3::new(self.model[3][0], self.model[3][1], self.model[3][2])
    }

    pub fn color_shift(&self) -> f32 {
        self.color[3]
    }
}

const INSTANCE_ATTRIBUTES: [VertexAttribute; 6] = [
    VertexAttribute { format: VertexFormat::Float32x4, offset: 0, shader_location: 3 },
    VertexAttribute { format: VertexFormat::Float32x4, offset: 16, shader_location: 4 },
    VertexAttribute { format: VertexFormat::Float32x4, offset: 32, shader_location: 5 },
    VertexAttribute { format: VertexFormat::Float32x4, offset: 48, shader_location: 6 },
    VertexAttribute { format: VertexFormat::Float32x4, offset: 64, shader_location: 7 },
    VertexAttribute { format: VertexFormat::Float32x4, offset: 80, shader_location: 8 },
];

/// One instanced draw: shared mesh (the entity's `Handle<Mesh>`) × `instances`.
#[derive(Component, Clone, Debug)]
pub struct InstancedBatch {
    pub instances: Arc<[InstanceRaw]>,
    /// Drawn prefix length, `<= instances.len()`.
    pub visible_count: u32,
}

impl InstancedBatch {
    pub fn new(instances: Arc<[InstanceRaw]>) -> Self {
        let visible_count = instances.len() as u32;
        Self { instances, visible_count }
    }

    pub fn full_count(&self) -> u32 {
        self.instances.len() as u32
    }
}

impl ExtractComponent for InstancedBatch {
    type QueryData = &'static InstancedBatch;
    type QueryFilter = ();
    type Out = Self;

    // Cloning bumps the Arc; instance data is never copied.
    fn extract_component(item: QueryItem<'_, Self::QueryData>) -> Option<Self> {
        Some(item.clone())
    }
}

pub struct VegetationRenderPlugin;

impl Plugin for VegetationRenderPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins((
            ExtractComponentPlugin::<InstancedBatch>::default(),
            ExtractResourcePlugin::<ShadingSettings>::default(),
        ));
        let Some(render_app) = app.get_sub_app_mut(RenderApp) else { return; };
        render_app
            .add_render_command::<Transparent3d, DrawVegetation>()
            .init_resource::<SpecializedMeshPipelines<VegetationPipeline>>()
            .init_resource::<BatchBuffers>()
            .init_resource::<ShadingBuffer>()
            .add_systems(
                Render,
                (
                    queue_vegetation.in_set(RenderSet::QueueMeshes),
                    (prepare_batch_buffers, prepare_shading_buffer).in_set(RenderSet::PrepareResources),
                ),
            );
    }

    fn finish(&self, app: &mut App) {
        if app.get_sub_app(RenderApp).is_none() {
            return;
        }
        let shader = app.world().resource::<AssetServer>().load(SHADER_PATH);
        let Some(render_app) = app.get_sub_app_mut(RenderApp) else { return; };
        let pipeline = VegetationPipeline::new(render_app.world(), shader);
        render_app.insert_resource(pipeline);
    }
}

// ----------------------- Render world resources -----------------------

struct GpuBatch {
    buffer: Buffer,
    source: Arc<[InstanceRaw]>,
    visible_count: u32,
}

/// GPU buffers keyed by batch entity; survives across frames.
#[derive(Resource, Default)]
pub struct BatchBuffers {
    batches: HashMap<Entity, GpuBatch>,
}

#[derive(Resource, Default)]
pub struct ShadingBuffer {
    uniform: UniformBuffer<ShadingUniform>,
    bind_group: Option<BindGroup>,
}

#[derive(Resource)]
pub struct VegetationPipeline {
    shader: Handle<Shader>,
    mesh_pipeline: MeshPipeline,
    shading_layout: BindGroupLayout,
}

impl VegetationPipeline {
    fn new(world: &World, shader: Handle<Shader>) -> Self {
        let shading_layout = world.resource::<RenderDevice>().create_bind_group_layout(
            "vegetation_shading_layout",
            &BindGroupLayoutEntries::single(
                ShaderStages::VERTEX_FRAGMENT,
                uniform_buffer::<ShadingUniform>(false),
            ),
        );
        Self {
            shader,
            mesh_pipeline: world.resource::<MeshPipeline>().clone(),
            shading_layout,
        }
    }
}

impl SpecializedMeshPipeline for VegetationPipeline {
    type Key = MeshPipelineKey;

    fn specialize(
        &self,
        key: Self::Key,
        layout: &MeshVertexBufferLayoutRef,
    ) -> Result<RenderPipelineDescriptor, SpecializedMeshPipelineError> {
        let mut descriptor = self.mesh_pipeline.specialize(key, layout)?;
        descriptor.label = Some("vegetation_pipeline".into());
        descriptor.vertex.shader = self.shader.clone();
        descriptor.vertex.buffers.push(VertexBufferLayout {
            array_stride: std::mem::size_of::<InstanceRaw>() as u64,
            step_mode: VertexStepMode::Instance,
            attributes: INSTANCE_ATTRIBUTES.to_vec(),
        });
        descriptor.layout.push(self.shading_layout.clone());
        if let Some(fragment) = descriptor.fragment.as_mut() {
            fragment.shader = self.shader.clone();
        }
        Ok(descriptor)
    }
}

// ----------------------- Render systems -----------------------

#[allow(clippy::too_many_arguments)]
fn queue_vegetation(
    draw_functions: Res<DrawFunctions<Transparent3d>>,
    pipeline: Res<VegetationPipeline>,
    msaa: Res<Msaa>,
    mut pipelines: ResMut<SpecializedMeshPipelines<VegetationPipeline>>,
    pipeline_cache: Res<PipelineCache>,
    meshes: Res<RenderAssets<GpuMesh>>,
    render_mesh_instances: Res<RenderMeshInstances>,
    batches: Query<(Entity, &InstancedBatch)>,
    mut phases: ResMut<ViewSortedRenderPhases<Transparent3d>>,
    views: Query<(Entity, &ExtractedView)>,
) {
    let draw = draw_functions.read().id::<DrawVegetation>();
    let msaa_key = MeshPipelineKey::from_msaa_samples(msaa.samples());

    for (view_entity, view) in &views {
        let Some(phase) = phases.get_mut(&view_entity) else { continue; };
        let view_key = msaa_key | MeshPipelineKey::from_hdr(view.hdr);
        let rangefinder = view.rangefinder3d();
        for (entity, batch) in &batches {
            if batch.visible_count == 0 {
                continue;
            }
            let Some(mesh_instance) = render_mesh_instances.render_mesh_queue_data(entity) else { continue; };
            let Some(mesh) = meshes.get(mesh_instance.mesh_asset_id) else { continue; };
            let key = view_key | MeshPipelineKey::from_primitive_topology(mesh.primitive_topology());
            let pipeline_id = match pipelines.specialize(&pipeline_cache, &pipeline, key, &mesh.layout) {
                Ok(id) => id,
                Err(e) => {
                    error!("Vegetation: pipeline specialization failed: {e}");
                    continue;
                }
            };
            phase.add(Transparent3d {
                entity,
                pipeline: pipeline_id,
                draw_function: draw,
                distance: rangefinder.distance_translation(&mesh_instance.translation),
                batch_range: 0..1,
                extra_index: PhaseItemExtraIndex::NONE,
            });
        }
    }
}

fn prepare_batch_buffers(
    mut cache: ResMut<BatchBuffers>,
    batches: Query<(Entity, &InstancedBatch)>,
    render_device: Res<RenderDevice>,
) {
    cache.batches.retain(|entity, _| batches.contains(*entity));
    for (entity, batch) in &batches {
        if batch.instances.is_empty() {
            cache.batches.remove(&entity);
            continue;
        }
        let visible_count = batch.visible_count.min(batch.full_count());
        match cache.batches.get_mut(&entity) {
            Some(gpu) if Arc::ptr_eq(&gpu.source, &batch.instances) => {
                gpu.visible_count = visible_count;
            }
            _ => {
                let buffer = render_device.create_buffer_with_data(&BufferInitDescriptor {
                    label: Some("vegetation_instance_buffer"),
                    contents: bytemuck::cast_slice(&batch.instances),
                    usage: BufferUsages::VERTEX,
                });
                cache.batches.insert(
                    entity,
                    GpuBatch {
                        buffer,
                        source: batch.instances.clone(),
                        visible_count,
                    },
                );
            }
        }
    }
}

fn prepare_shading_buffer(
    shading_buffer: ResMut<ShadingBuffer>,
    settings: Option<Res<ShadingSettings>>,
    pipeline: Res<VegetationPipeline>,
    render_device: Res<RenderDevice>,
    render_queue: Res<RenderQueue>,
) {
    let Some(settings) = settings else { return; };
    let shading = shading_buffer.into_inner();
    shading.uniform.set(settings.uniform());
    shading.uniform.write_buffer(&render_device, &render_queue);
    if shading.bind_group.is_none() {
        if let Some(binding) = shading.uniform.binding() {
            shading.bind_group = Some(render_device.create_bind_group(
                "vegetation_shading_bind_group",
                &pipeline.shading_layout,
                &BindGroupEntries::single(binding),
            ));
        }
    }
}

// ----------------------- Draw commands -----------------------

type DrawVegetation = (
    SetItemPipeline,
    SetMeshViewBindGroup<0>,
    SetMeshBindGroup<1>,
    SetShadingBindGroup<2>,
    DrawInstancedBatch,
);

pub struct SetShadingBindGroup<const I: usize>;

impl<P: PhaseItem, const I: usize> RenderCommand<P> for SetShadingBindGroup<I> {
    type Param = SRes<ShadingBuffer>;
    type ViewQuery = ();
    type ItemQuery = ();

    fn render<'w>(
        _item: &P,
        _view: (),
        _entity: Option<()>,
        shading: SystemParamItem<'w, '_, Self::Param>,
        pass: &mut TrackedRenderPass<'w>,
    ) -> RenderCommandResult {
        let Some(bind_group) = shading.into_inner().bind_group.as_ref() else {
            return RenderCommandResult::Failure;
        };
        pass.set_bind_group(I, bind_group, &[]);
        RenderCommandResult::Success
    }
}

pub struct DrawInstancedBatch;

impl<P: PhaseItem> RenderCommand<P> for DrawInstancedBatch {
    type Param = (SRes<RenderAssets<GpuMesh>>, SRes<RenderMeshInstances>, SRes<BatchBuffers>);
    type ViewQuery = ();
    type ItemQuery = ();

    #[inline]
    fn render<'w>(
        item: &P,
        _view: (),
        _entity: Option<()>,
        (meshes, render_mesh_instances, cache): SystemParamItem<'w, '_, Self::Param>,
        pass: &mut TrackedRenderPass<'w>,
    ) -> RenderCommandResult {
        let Some(mesh_instance) = render_mesh_instances.render_mesh_queue_data(item.entity()) else {
            return RenderCommandResult::Failure;
        };
        let Some(gpu_mesh) = meshes.into_inner().get(mesh_instance.mesh_asset_id) else {
            return RenderCommandResult::Failure;
        };
        let Some(batch) = cache.into_inner().batches.get(&item.entity()) else {
            return RenderCommandResult::Failure;
        };

        pass.set_vertex_buffer(0, gpu_mesh.vertex_buffer.slice(..));
        pass.set_vertex_buffer(1, batch.buffer.slice(..));
        let instances = 0..batch.visible_count;
        match &gpu_mesh.buffer_info {
            GpuBufferInfo::Indexed { buffer, index_format, count } => {
                pass.set_index_buffer(buffer.slice(..), 0, *index_format);
                pass.draw_indexed(0..*count, 0, instances);
            }
            GpuBufferInfo::NonIndexed => {
                pass.draw(0..gpu_mesh.vertex_count, instances);
            }
        }
        RenderCommandResult::Success
    }
}
