#![allow(clippy::all, non_camel_case_types, non_snake_case, non_upper_case_globals, dead_code)]

include!(concat!(env!("OUT_DIR"), "/bindings.rs"));

macro_rules! call {
    ($expr:expr) => {{
        let result = unsafe { $expr };
        if cfg!(debug_assertions) {
            let error = unsafe { $crate::renderer::gl::GetError() };
            if error != $crate::renderer::gl::NO_ERROR {
                let error_number_stringified;
                let error_name = match error {
                    $crate::renderer::gl::INVALID_ENUM => "INVALID_ENUM",
                    $crate::renderer::gl::INVALID_VALUE => "INVALID_VALUE",
                    $crate::renderer::gl::INVALID_OPERATION => "INVALID_OPERATION",
                    $crate::renderer::gl::OUT_OF_MEMORY => "OUT_OF_MEMORY",
                    $crate::renderer::gl::INVALID_FRAMEBUFFER_OPERATION => {
                        "INVALID_FRAMEBUFFER_OPERATION"
                    }
                    _ => {
                        error_number_stringified = format!("{error}");
                        &error_number_stringified
                    }
                };
                panic!(
                    "OpenGL error {error_name} at {}:{}:{}",
                    file!(),
                    line!(),
                    column!(),
                );
            }
        }
        result
    }};
}
pub(crate) use call;

/// Compiles a shader from source, panicking with the info log on failure.
/// Shader compilation failures are programmer errors here since all sources
/// are embedded in the binary.
pub fn create_shader(shader_type: types::GLenum, source: &str) -> types::GLuint {
    let shader = call!(CreateShader(shader_type));
    let sources = [source.as_bytes().as_ptr() as *const i8];
    let source_lens = [source.len() as i32];
    call!(ShaderSource(
        shader,
        1,
        sources.as_ptr(),
        source_lens.as_ptr(),
    ));
    call!(CompileShader(shader));
    let mut compile_status = 0;
    call!(GetShaderiv(shader, COMPILE_STATUS, &mut compile_status));
    if compile_status == FALSE as i32 {
        let mut info_log = [0u8; 4096];
        let mut length = 0;
        call!(GetShaderInfoLog(
            shader,
            4096,
            &mut length,
            info_log.as_mut_ptr() as *mut i8,
        ));
        let info_log = std::str::from_utf8(&info_log[..length as usize]).unwrap();
        panic!("Compiling shader failed: {info_log}");
    }
    shader
}

pub fn create_program(shaders: &[types::GLuint]) -> types::GLuint {
    let program = call!(CreateProgram());
    for &shader in shaders {
        call!(AttachShader(program, shader));
    }
    call!(LinkProgram(program));
    let mut link_status = 0;
    call!(GetProgramiv(program, LINK_STATUS, &mut link_status));
    if link_status == FALSE as i32 {
        let mut info_log = [0u8; 4096];
        let mut length = 0;
        call!(GetProgramInfoLog(
            program,
            4096,
            &mut length,
            info_log.as_mut_ptr() as *mut i8,
        ));
        let info_log = std::str::from_utf8(&info_log[..length as usize]).unwrap();
        panic!("Linking shader program failed: {info_log}");
    }
    program
}

/// Looks up a named uniform, returning -1 if the driver optimized it out.
/// Uploads to location -1 are silent no-ops, so callers can store the result
/// as-is.
pub fn get_uniform_location(program: types::GLuint, name: &str) -> types::GLint {
    let name = std::ffi::CString::new(name).unwrap();
    let location = call!(GetUniformLocation(program, name.as_ptr()));
    if location == -1 {
        log::debug!("uniform {:?} not present in linked program", name);
    }
    location
}

pub fn buffer_data(target: types::GLenum, data: &[u8], usage: types::GLenum) {
    call!(BufferData(
        target,
        data.len() as isize,
        data.as_ptr() as *const std::ffi::c_void,
        usage,
    ));
}
